//! Basic usage example

use ioctl_idlc::{load_str, HasName, Introspect, Named, ScopeItem};

fn main() {
    let idl = r#"
        !ioctl-iface {
            name: flashdev,
            description: Flash programming device.,
            number: 0xF1,
            items: [
                !constant {name: page_size, description: Bytes per page., type: !builtin uint32_t, value: 256},
                &state !enum {
                    name: state, description: Device state., underlying_type: !builtin uint8_t,
                    values: [
                        {name: idle, description: Waiting for commands., value: "0"},
                        {name: erasing, description: Erase in progress.},
                        {name: writing, description: Write in progress.},
                    ],
                },
                &write !struct {
                    name: write_request,
                    description: "Write request.\nThe data pointer refers to user memory.",
                    fields: [
                        {name: offset, description: Byte offset., type: !builtin uint64_t},
                        {name: length, description: Byte count., type: !builtin uint32_t},
                        {name: pad, description: '', type: !builtin uint32_t, meta: {padding: yes}},
                        {name: data, description: Source buffer.,
                         type: !pointer64 {value_type: !builtin uint8_t, const: yes}},
                    ],
                },
            ],
            commands: [
                {name: get_state, description: Query state., number: 1, command_type: _IOR, arg_type: *state},
                {name: write, description: Write data., number: 2, command_type: _IOW, arg_type: *write},
            ],
        }
    "#;

    match load_str(idl) {
        Ok(iface) => {
            println!("Interface {} (number {})", iface.name(), iface.number().hex());
            for line in iface.description().wrap(60) {
                println!("  {}", line);
            }

            println!("\nItems:");
            for item in iface.items() {
                let kind = match item {
                    ScopeItem::Constant(_) => "constant",
                    ScopeItem::Enum(_) => "enum",
                    ScopeItem::Bitmask(_) => "bitmask",
                    ScopeItem::Compound(node) if node.is_union() => "union",
                    ScopeItem::Compound(_) => "struct",
                };
                println!("  {:<10} {}", kind, item.as_named().full_name_cxx());
            }

            println!("\nCommands:");
            for command in iface.commands() {
                println!(
                    "  {:<10} {} {}({})",
                    command.name(),
                    command.command_type(),
                    command.number().hex(),
                    command.arg_type().full_name_c().unwrap_or_default()
                );
            }

            println!("\nNamed entities:");
            for node in iface.named_entities() {
                println!("  {:<30} {}", node.full_name_cxx(), node.full_name_c());
            }
        }
        Err(e) => {
            eprintln!("{}", e.trace());
            std::process::exit(1);
        }
    }
}
