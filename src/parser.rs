//! ioctl-idlc document reader
//!
//! Reads one YAML document: block mappings and sequences laid out by
//! indentation, `|` and `>` block scalars, `{}` mappings and `[]`
//! sequences, plain and quoted scalars, `!tags`, `&anchors` and `*aliases`.
//!
//! Block structure is tracked here line by line. Flow collections and quoted
//! scalars are matched by the pest grammar starting at the current position.

use std::collections::HashMap;
use std::str::Chars;

use pest::error::LineColLocation;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::document::{Document, Node, NodeId, NodeKind, Scalar, ScalarStyle};
use crate::error::{ErrorCode, IdlError, Result, SourceLocation};

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct IdlParser;

const BLANKS: &[char] = &[' ', '\t', '\r'];

/// Parse document text
pub fn parse(input: &str) -> Result<Document> {
    let mut reader = Reader::new(input);
    let root = reader.document()?;
    reader.doc.set_root(root);

    Ok(reader.doc)
}

/// Where a block node sits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Document,
    MappingValue,
    SequenceEntry,
}

impl Context {
    /// `key: value` and `- item` may start on the same line as the node
    fn allows_compact(self) -> bool {
        matches!(self, Context::Document | Context::SequenceEntry)
    }
}

#[derive(Debug, Clone, Copy)]
enum Chomp {
    Strip,
    Clip,
    Keep,
}

struct Reader<'i> {
    input: &'i str,
    pos: usize,
    line: usize,
    line_start: usize,
    /// Start of the pest fragment being walked
    origin: SourceLocation,
    doc: Document,
    anchors: HashMap<String, NodeId>,
}

impl<'i> Reader<'i> {
    fn new(input: &'i str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            line_start: 0,
            origin: SourceLocation { line: 1, column: 1 },
            doc: Document::new(),
            anchors: HashMap::new(),
        }
    }

    // ========== Cursor ==========

    fn rest(&self) -> &'i str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.line_start = self.pos;
        }
        Some(c)
    }

    /// Move forward by `len` bytes.
    fn advance(&mut self, len: usize) {
        let end = self.pos + len;
        while self.pos < end && self.bump().is_some() {}
    }

    fn column(&self) -> usize {
        self.input[self.line_start..self.pos].chars().count()
    }

    fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column() + 1,
        }
    }

    fn error(&self, message: &str) -> IdlError {
        IdlError::new(ErrorCode::E01001, format!("Parse error: {}", message))
            .with_location(self.location())
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.bump();
        }
    }

    fn at_line_end(&self) -> bool {
        matches!(self.peek(), None | Some('\n' | '\r' | '#'))
    }

    /// Consume trailing blanks, a comment and the line break.
    fn end_line(&mut self) -> Result<()> {
        self.skip_spaces();
        if self.peek() == Some('#') {
            while !matches!(self.peek(), None | Some('\n')) {
                self.bump();
            }
        }
        if self.peek() == Some('\r') {
            self.bump();
        }
        match self.peek() {
            None => Ok(()),
            Some('\n') => {
                self.bump();
                Ok(())
            }
            Some(_) => Err(self.error("unexpected content after a node")),
        }
    }

    /// Skip blank and comment lines. Called at a line start; stays at the
    /// start of the next content line and returns its indentation.
    fn next_content_line(&mut self) -> Result<Option<usize>> {
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Ok(None);
            }

            let line = rest.split('\n').next().unwrap_or("");
            let content = line.trim_start_matches([' ', '\t']).trim_end_matches('\r');
            if content.is_empty() || content.starts_with('#') {
                self.advance(line.len());
                if self.bump().is_none() {
                    return Ok(None);
                }
                continue;
            }

            let indent = line.len() - line.trim_start_matches(' ').len();
            if line[indent..].starts_with('\t') {
                self.advance(indent);
                return Err(self.error("tabs are not allowed in indentation"));
            }
            return Ok(Some(indent));
        }
    }

    // ========== Block structure ==========

    fn document(&mut self) -> Result<NodeId> {
        let mut root = None;

        if let Some(indent) = self.next_content_line()? {
            self.advance(indent);
            if is_marker(self.rest(), "---") {
                self.advance(3);
            }
            if is_marker(self.rest(), "...") {
                self.advance(3);
                self.end_line()?;
            } else {
                root = Some(self.block_node(-1, Context::Document)?);
            }
        }

        if let Some(indent) = self.next_content_line()? {
            self.advance(indent);
            if !is_marker(self.rest(), "...") {
                return Err(self.error("expected the end of the document"));
            }
            self.advance(3);
            self.end_line()?;
            if let Some(indent) = self.next_content_line()? {
                self.advance(indent);
                return Err(self.error("expected the end of the document"));
            }
        }

        Ok(match root {
            Some(root) => root,
            None => self.doc.push(Node {
                kind: NodeKind::Scalar(Scalar::plain("")),
                tag: None,
                location: SourceLocation { line: 1, column: 1 },
            }),
        })
    }

    /// Read a node starting mid-line, after `key:`, `- ` or `---`.
    ///
    /// `parent` is the indentation of the enclosing collection, -1 at the
    /// root. Returns at the start of the line after the node.
    fn block_node(&mut self, parent: isize, context: Context) -> Result<NodeId> {
        self.skip_spaces();
        let location = self.location();

        if self.peek() == Some('*') {
            let id = self.block_alias()?;
            self.end_line()?;
            return Ok(id);
        }

        let (tag, anchor) = self.properties()?;
        let has_properties = tag.is_some() || anchor.is_some();

        let id = if self.at_line_end() {
            self.end_line()?;
            match self.below(parent, context, has_properties)? {
                Some(id) => {
                    if let Some(tag) = tag {
                        self.doc.set_tag(id, tag);
                    }
                    id
                }
                None => self.doc.push(Node {
                    kind: NodeKind::Scalar(Scalar::plain("")),
                    tag,
                    location,
                }),
            }
        } else {
            let kind = self.inline(parent, context, has_properties)?;
            self.doc.push(Node {
                kind,
                tag,
                location,
            })
        };

        // Registered only once the node is complete, so a node can never
        // contain an alias to itself.
        if let Some(name) = anchor {
            self.anchors.insert(name, id);
        }

        Ok(id)
    }

    /// Content of a node whose first line held nothing but properties.
    fn below(
        &mut self,
        parent: isize,
        context: Context,
        has_properties: bool,
    ) -> Result<Option<NodeId>> {
        let indent = match self.next_content_line()? {
            Some(indent) => indent,
            None => return Ok(None),
        };
        if indent == 0 && at_any_marker(self.rest()) {
            return Ok(None);
        }

        let nested = indent as isize > parent;
        let indentless = indent as isize == parent && context == Context::MappingValue;
        if is_entry(&self.rest()[indent..]) && (nested || indentless) {
            self.advance(indent);
            let location = self.location();
            let kind = self.block_sequence(indent)?;
            return Ok(Some(self.doc.push(Node {
                kind,
                tag: None,
                location,
            })));
        }
        if !nested {
            return Ok(None);
        }

        self.advance(indent);
        if self.looks_like_key() {
            let location = self.location();
            let kind = self.block_mapping(indent)?;
            return Ok(Some(self.doc.push(Node {
                kind,
                tag: None,
                location,
            })));
        }
        if has_properties && matches!(self.peek(), Some('*' | '!' | '&')) {
            return Err(self.error("a node cannot carry two sets of properties"));
        }

        self.block_node(parent, context).map(Some)
    }

    /// Content starting on the current line.
    fn inline(&mut self, parent: isize, context: Context, has_properties: bool) -> Result<NodeKind> {
        if self.looks_like_key() {
            if !context.allows_compact() {
                return Err(self.error("mapping values are not allowed here"));
            }
            if has_properties {
                return Err(self.error("a tagged block mapping must start on its own line"));
            }
            let indent = self.column();
            return self.block_mapping(indent);
        }

        if is_entry(self.rest()) && context.allows_compact() && !has_properties {
            let indent = self.column();
            return self.block_sequence(indent);
        }

        match self.peek() {
            Some('|' | '>') => self.block_scalar(parent),
            Some('[' | '{' | '"' | '\'') => {
                let kind = self.fragment()?;
                self.end_line()?;
                Ok(kind)
            }
            _ => self.block_plain(parent),
        }
    }

    /// Entries at column `indent`, the first starting at the current position.
    fn block_mapping(&mut self, indent: usize) -> Result<NodeKind> {
        let mut entries = Vec::new();

        loop {
            let key = self.block_key()?;
            self.skip_spaces();
            if self.peek() != Some(':') {
                return Err(self.error("expected ':' after a mapping key"));
            }
            self.bump();
            let value = self.block_node(indent as isize, Context::MappingValue)?;
            entries.push((key, value));

            match self.next_content_line()? {
                Some(next) if next == indent && !(next == 0 && at_any_marker(self.rest())) => {
                    self.advance(next);
                    if is_entry(self.rest()) {
                        return Err(self.error("unexpected sequence entry in a mapping"));
                    }
                }
                Some(next) if next > indent => {
                    self.advance(next);
                    return Err(self.error("bad indentation of a mapping entry"));
                }
                _ => break,
            }
        }

        Ok(NodeKind::Mapping(entries))
    }

    fn block_key(&mut self) -> Result<NodeId> {
        let location = self.location();
        let kind = match self.peek() {
            Some('"' | '\'') => self.fragment()?,
            _ => {
                let text = self.plain_segment();
                if text.is_empty() {
                    return Err(self.error("expected a mapping key"));
                }
                NodeKind::Scalar(Scalar::plain(text))
            }
        };

        Ok(self.doc.push(Node {
            kind,
            tag: None,
            location,
        }))
    }

    /// `- ` entries at column `indent`, the first at the current position.
    fn block_sequence(&mut self, indent: usize) -> Result<NodeKind> {
        let mut items = Vec::new();

        loop {
            self.bump();
            items.push(self.block_node(indent as isize, Context::SequenceEntry)?);

            match self.next_content_line()? {
                Some(next) if next == indent && is_entry(&self.rest()[next..]) => {
                    self.advance(next);
                }
                Some(next) if next > indent => {
                    self.advance(next);
                    return Err(self.error("bad indentation of a sequence entry"));
                }
                _ => break,
            }
        }

        Ok(NodeKind::Sequence(items))
    }

    fn block_alias(&mut self) -> Result<NodeId> {
        let location = self.location();
        self.bump();
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || ",[]{}".contains(c))
            .unwrap_or(rest.len());
        self.advance(len);

        self.lookup(&rest[..len], location)
    }

    /// Tag and anchor in either order.
    fn properties(&mut self) -> Result<(Option<String>, Option<String>)> {
        let mut tag = None;
        let mut anchor = None;

        loop {
            let rest = self.rest();
            let len = match self.peek() {
                Some('!') if tag.is_none() => {
                    let body = rest[1..].strip_prefix('!').map_or(1, |_| 2);
                    body + rest[body..]
                        .find(|c: char| !(c.is_ascii_alphanumeric() || "-_./".contains(c)))
                        .unwrap_or(rest.len() - body)
                }
                Some('&') if anchor.is_none() => {
                    1 + rest[1..]
                        .find(|c: char| c.is_whitespace() || ",[]{}".contains(c))
                        .unwrap_or(rest.len() - 1)
                }
                _ => break,
            };

            let text = &rest[..len];
            if let Some(name) = text.strip_prefix('&') {
                if name.is_empty() {
                    return Err(self.error("anchor without a name"));
                }
                anchor = Some(name.to_string());
            } else {
                tag = Some(text.to_string());
            }
            self.advance(len);

            if !matches!(self.peek(), None | Some(' ' | '\t' | '\r' | '\n')) {
                return Err(self.error("expected a space after node properties"));
            }
            self.skip_spaces();
        }

        Ok((tag, anchor))
    }

    /// Does the current line hold `key:` followed by a blank or line end?
    fn looks_like_key(&self) -> bool {
        let line = self.rest().split('\n').next().unwrap_or("");
        let after = match line.chars().next() {
            Some(quote @ ('"' | '\'')) => match quoted_end(line, quote) {
                Some(end) => line[end..].trim_start_matches([' ', '\t']),
                None => return false,
            },
            None | Some('[' | '{' | '#' | '|' | '>' | '*' | '&' | '!' | '%' | '@' | '`') => {
                return false
            }
            Some(_) if is_entry(line) => return false,
            Some(_) => {
                let mut prev = '\0';
                let mut chars = line.chars().peekable();
                while let Some(c) = chars.next() {
                    if c == '#' && matches!(prev, ' ' | '\t') {
                        return false;
                    }
                    if c == ':' && matches!(chars.peek(), None | Some(' ' | '\t' | '\r')) {
                        return true;
                    }
                    prev = c;
                }
                return false;
            }
        };

        after.starts_with(':') && matches!(after[1..].chars().next(), None | Some(' ' | '\t' | '\r'))
    }

    // ========== Block scalars ==========

    /// One line of a plain scalar, up to a comment, `: ` or the line end.
    fn plain_segment(&mut self) -> &'i str {
        let rest = self.rest();
        let mut end = 0;
        let mut prev = '\0';
        let mut chars = rest.char_indices().peekable();

        while let Some((idx, c)) = chars.next() {
            let stop = match c {
                '\n' | '\r' => true,
                '#' => matches!(prev, ' ' | '\t'),
                ':' => matches!(chars.peek(), None | Some((_, ' ' | '\t' | '\r' | '\n'))),
                _ => false,
            };
            if stop {
                break;
            }
            end = idx + c.len_utf8();
            prev = c;
        }

        let text = rest[..end].trim_end_matches([' ', '\t']);
        self.advance(text.len());
        text
    }

    fn block_plain(&mut self, parent: isize) -> Result<NodeKind> {
        let mut text = self.plain_segment().to_string();
        self.end_line()?;

        while let Some((blanks, skip)) = self.continuation(parent) {
            self.advance(skip);
            if blanks == 0 {
                text.push(' ');
            } else {
                text.push_str(&"\n".repeat(blanks));
            }
            text.push_str(self.plain_segment());
            self.end_line()?;
        }

        Ok(NodeKind::Scalar(Scalar::plain(text)))
    }

    /// Blank lines and bytes to skip before the next line of a plain
    /// scalar, or `None` when the scalar ends here.
    fn continuation(&self, parent: isize) -> Option<(usize, usize)> {
        let mut offset = 0;
        let mut blanks = 0;

        for line in self.rest().split_inclusive('\n') {
            let body = line.trim_end_matches(['\n', '\r']);
            let content = body.trim_start_matches(' ');
            let indent = body.len() - content.len();

            if content.trim_start_matches('\t').is_empty() {
                blanks += 1;
                offset += line.len();
                continue;
            }
            if content.starts_with('#') || indent as isize <= parent || at_any_marker(body) {
                return None;
            }
            return Some((blanks, offset + indent));
        }

        None
    }

    fn block_scalar(&mut self, parent: isize) -> Result<NodeKind> {
        let style = match self.bump() {
            Some('|') => ScalarStyle::Literal,
            _ => ScalarStyle::Folded,
        };
        let mut chomp = Chomp::Clip;
        let mut explicit = None;
        while let Some(c) = self.peek() {
            match c {
                '-' => chomp = Chomp::Strip,
                '+' => chomp = Chomp::Keep,
                '1'..='9' if explicit.is_none() => explicit = c.to_digit(10),
                _ => break,
            }
            self.bump();
        }
        if !matches!(self.peek(), None | Some(' ' | '\t' | '\r' | '\n')) {
            return Err(self.error("invalid block scalar header"));
        }
        self.end_line()?;

        let mut width = explicit.map(|digits| parent.max(0) as usize + digits as usize);
        let mut lines: Vec<&str> = Vec::new();

        loop {
            let rest = self.rest();
            if rest.is_empty() {
                break;
            }
            let raw = rest.split('\n').next().unwrap_or("");
            let line = raw.trim_end_matches('\r');
            let spaces = line.len() - line.trim_start_matches(' ').len();
            let blank = spaces == line.len();

            if blank {
                lines.push(width.and_then(|indent| line.get(indent..)).unwrap_or(""));
            } else {
                let indent = match width {
                    Some(indent) => indent,
                    None if spaces as isize <= parent => break,
                    None => {
                        width = Some(spaces);
                        spaces
                    }
                };
                if spaces < indent {
                    break;
                }
                lines.push(&line[indent..]);
            }

            self.advance(raw.len());
            if self.bump().is_none() {
                break;
            }
        }

        let end = lines.iter().rposition(|line| !line.is_empty()).map_or(0, |idx| idx + 1);
        let trailing = lines.len() - end;
        let body = &lines[..end];

        let mut value = match style {
            ScalarStyle::Literal => body.join("\n"),
            _ => fold_block(body),
        };
        match chomp {
            Chomp::Strip => {}
            Chomp::Clip if end > 0 => value.push('\n'),
            Chomp::Clip => {}
            Chomp::Keep if end > 0 => value.push_str(&"\n".repeat(trailing + 1)),
            Chomp::Keep => value.push_str(&"\n".repeat(trailing)),
        }

        Ok(NodeKind::Scalar(Scalar { value, style }))
    }

    // ========== Flow fragments ==========

    /// Match a flow collection or quoted scalar at the current position.
    fn fragment(&mut self) -> Result<NodeKind> {
        let input = self.input;
        let origin = self.location();
        let pair = IdlParser::parse(Rule::fragment, &input[self.pos..])
            .map_err(|e| syntax_error(e, origin))?
            .next()
            .ok_or_else(|| self.error("expected a flow node"))?;
        let consumed = pair.as_span().end();
        let content = pair
            .into_inner()
            .next()
            .ok_or_else(|| self.error("expected a flow node"))?;

        self.origin = origin;
        let kind = self.content(content)?;
        self.advance(consumed);

        Ok(kind)
    }

    /// Document position of a pair inside the current fragment
    fn at(&self, pair: &Pair<Rule>) -> SourceLocation {
        let (line, column) = pair.as_span().start_pos().line_col();
        shift(self.origin, line, column)
    }

    fn node(&mut self, pair: Pair<Rule>) -> Result<NodeId> {
        let location = self.at(&pair);
        let mut tag = None;
        let mut anchor = None;
        let mut kind = None;

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::alias => {
                    let location = self.at(&inner);
                    return self.lookup(&anchor_name(inner), location);
                }
                Rule::properties => {
                    for prop in inner.into_inner() {
                        match prop.as_rule() {
                            Rule::tag => tag = Some(prop.as_str().to_string()),
                            Rule::anchor => anchor = Some(anchor_name(prop)),
                            _ => {}
                        }
                    }
                }
                _ => kind = Some(self.content(inner)?),
            }
        }

        let id = self.doc.push(Node {
            kind: kind.unwrap_or_else(|| NodeKind::Scalar(Scalar::plain(""))),
            tag,
            location,
        });

        if let Some(name) = anchor {
            self.anchors.insert(name, id);
        }

        Ok(id)
    }

    fn content(&mut self, pair: Pair<Rule>) -> Result<NodeKind> {
        let location = self.at(&pair);

        match pair.as_rule() {
            Rule::flow_mapping => self.mapping(pair),
            Rule::flow_sequence => self.sequence(pair),
            Rule::double_quoted => {
                let text = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
                Ok(NodeKind::Scalar(Scalar {
                    value: unescape(&fold_lines(text), location)?,
                    style: ScalarStyle::DoubleQuoted,
                }))
            }
            Rule::single_quoted => {
                let text = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
                Ok(NodeKind::Scalar(Scalar {
                    value: fold_lines(text).replace("''", "'"),
                    style: ScalarStyle::SingleQuoted,
                }))
            }
            _ => Ok(NodeKind::Scalar(Scalar::plain(fold_lines(pair.as_str())))),
        }
    }

    fn lookup(&self, name: &str, location: SourceLocation) -> Result<NodeId> {
        self.anchors.get(name).copied().ok_or_else(|| {
            IdlError::new(
                ErrorCode::E01002,
                format!("Found undefined alias '{}'.", name),
            )
            .with_location(location)
        })
    }

    fn sequence(&mut self, pair: Pair<Rule>) -> Result<NodeKind> {
        let mut items = Vec::new();

        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::node {
                items.push(self.node(inner)?);
            }
        }

        Ok(NodeKind::Sequence(items))
    }

    fn mapping(&mut self, pair: Pair<Rule>) -> Result<NodeKind> {
        let mut entries = Vec::new();

        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::entry {
                entries.push(self.entry(inner)?);
            }
        }

        Ok(NodeKind::Mapping(entries))
    }

    fn entry(&mut self, pair: Pair<Rule>) -> Result<(NodeId, NodeId)> {
        let location = self.at(&pair);
        let mut nodes = Vec::with_capacity(2);

        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::node {
                nodes.push(self.node(inner)?);
            }
        }

        let mut nodes = nodes.into_iter();
        let key = nodes.next().ok_or_else(|| {
            IdlError::new(ErrorCode::E01001, "Mapping entry without a key").with_location(location)
        })?;
        let value = match nodes.next() {
            Some(value) => value,
            None => self.doc.push(Node {
                kind: NodeKind::Scalar(Scalar::plain("")),
                tag: None,
                location,
            }),
        };

        Ok((key, value))
    }
}

/// Position `line:column` of a fragment starting at `origin`
fn shift(origin: SourceLocation, line: usize, column: usize) -> SourceLocation {
    if line == 1 {
        SourceLocation {
            line: origin.line,
            column: origin.column + column - 1,
        }
    } else {
        SourceLocation {
            line: origin.line + line - 1,
            column,
        }
    }
}

fn syntax_error(e: pest::error::Error<Rule>, origin: SourceLocation) -> IdlError {
    let (line, column) = match e.line_col {
        LineColLocation::Pos(pos) => pos,
        LineColLocation::Span(start, _) => start,
    };
    IdlError::new(
        ErrorCode::E01001,
        format!("Parse error: {}", e.variant.message()),
    )
    .with_location(shift(origin, line, column))
}

fn is_entry(line: &str) -> bool {
    line.starts_with('-') && matches!(line[1..].chars().next(), None | Some(' ' | '\t' | '\r' | '\n'))
}

fn is_marker(text: &str, marker: &str) -> bool {
    text.starts_with(marker)
        && matches!(text[marker.len()..].chars().next(), None | Some(' ' | '\t' | '\r' | '\n'))
}

fn at_any_marker(text: &str) -> bool {
    is_marker(text, "---") || is_marker(text, "...")
}

/// Byte offset just past the closing quote of a scalar opening `line`
fn quoted_end(line: &str, quote: char) -> Option<usize> {
    let mut chars = line.char_indices().skip(1).peekable();

    while let Some((idx, c)) = chars.next() {
        if quote == '"' && c == '\\' {
            chars.next();
        } else if c == quote {
            if quote == '\'' && chars.peek().is_some_and(|&(_, next)| next == '\'') {
                chars.next();
                continue;
            }
            return Some(idx + 1);
        }
    }

    None
}

/// Join the lines of a `>` scalar: breaks between two plain lines become a
/// space, blank lines become newlines, more indented lines keep their breaks.
fn fold_block(lines: &[&str]) -> String {
    let mut result = String::new();
    let mut breaks = 0;
    let mut prev_more = false;

    for (idx, line) in lines.iter().enumerate() {
        if line.is_empty() {
            breaks += 1;
            continue;
        }

        let more = line.starts_with([' ', '\t']);
        if idx == breaks {
            result.push_str(&"\n".repeat(breaks));
        } else if more || prev_more {
            result.push_str(&"\n".repeat(breaks + 1));
        } else if breaks == 0 {
            result.push(' ');
        } else {
            result.push_str(&"\n".repeat(breaks));
        }

        result.push_str(line);
        prev_more = more;
        breaks = 0;
    }

    result
}

fn anchor_name(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::anchor_name)
        .map(|p| p.as_str().to_string())
        .unwrap_or_default()
}

/// Fold line breaks inside a scalar: a single break becomes a space, each
/// further break in a run is kept as a newline.
fn fold_lines(raw: &str) -> String {
    if !raw.contains('\n') {
        return raw.to_string();
    }

    let lines: Vec<&str> = raw.split('\n').collect();
    let last = lines.len() - 1;
    let mut result = String::new();
    let mut breaks = 0;

    for (idx, line) in lines.into_iter().enumerate() {
        if idx == 0 {
            result.push_str(line.trim_end_matches(BLANKS));
            continue;
        }

        let line = if idx == last {
            line.trim_start_matches(BLANKS)
        } else {
            line.trim_matches(BLANKS)
        };

        if line.is_empty() && idx != last {
            breaks += 1;
            continue;
        }

        if breaks > 0 {
            result.push_str(&"\n".repeat(breaks));
        } else {
            result.push(' ');
        }
        breaks = 0;
        result.push_str(line);
    }

    result
}

/// Handle double-quoted escape sequences
fn unescape(s: &str, location: SourceLocation) -> Result<String> {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }

        let escaped = match chars.next() {
            Some('0') => '\0',
            Some('a') => '\x07',
            Some('b') => '\x08',
            Some('t') | Some('\t') => '\t',
            Some('n') => '\n',
            Some('v') => '\x0b',
            Some('f') => '\x0c',
            Some('r') => '\r',
            Some('e') => '\x1b',
            Some(' ') => ' ',
            Some('"') => '"',
            Some('/') => '/',
            Some('\\') => '\\',
            Some('N') => '\u{85}',
            Some('_') => '\u{a0}',
            Some('L') => '\u{2028}',
            Some('P') => '\u{2029}',
            Some('x') => hex_escape(&mut chars, 2, location)?,
            Some('u') => hex_escape(&mut chars, 4, location)?,
            Some('U') => hex_escape(&mut chars, 8, location)?,
            Some(other) => {
                return Err(IdlError::new(
                    ErrorCode::E01003,
                    format!("Invalid escape sequence: \\{}", other),
                )
                .with_location(location));
            }
            None => {
                return Err(
                    IdlError::new(ErrorCode::E01003, "Unexpected end of string")
                        .with_location(location),
                );
            }
        };
        result.push(escaped);
    }

    Ok(result)
}

fn hex_escape(chars: &mut Chars, digits: usize, location: SourceLocation) -> Result<char> {
    let hex: String = chars.by_ref().take(digits).collect();

    u32::from_str_radix(&hex, 16)
        .ok()
        .filter(|_| hex.len() == digits)
        .and_then(char::from_u32)
        .ok_or_else(|| {
            IdlError::new(
                ErrorCode::E01003,
                format!("Invalid hex escape: {}", hex),
            )
            .with_location(location)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn root(doc: &Document) -> &Node {
        doc.node(doc.root().unwrap())
    }

    fn scalar(doc: &Document, id: NodeId) -> &str {
        &doc.node(id).as_scalar().unwrap().value
    }

    fn entries(node: &Node) -> &[(NodeId, NodeId)] {
        match &node.kind {
            NodeKind::Mapping(entries) => entries,
            other => panic!("expected a mapping, found {:?}", other),
        }
    }

    fn items(node: &Node) -> &[NodeId] {
        match &node.kind {
            NodeKind::Sequence(items) => items,
            other => panic!("expected a sequence, found {:?}", other),
        }
    }

    #[test]
    fn test_parse_tagged_scalar() {
        let doc = parse("!builtin uint32_t").unwrap();
        let node = root(&doc);
        assert_eq!(node.tag.as_deref(), Some("!builtin"));
        assert_eq!(node.as_scalar(), Some(&Scalar::plain("uint32_t")));
    }

    #[test]
    fn test_parse_mapping() {
        let input = r#"
            --- !enum  # comment
            {
                name: widget,
                description: "A widget.",
                underlying_type: !builtin uint32_t,
                values: [{name: a, description: x}, {name: b, description: 'it''s'}],
            }
        "#;

        let doc = parse(input).unwrap();
        let node = root(&doc);
        assert_eq!(node.tag.as_deref(), Some("!enum"));

        let entries = entries(node);
        let keys: Vec<&str> = entries.iter().map(|(k, _)| scalar(&doc, *k)).collect();
        assert_eq!(keys, vec!["name", "description", "underlying_type", "values"]);
        assert_eq!(scalar(&doc, entries[1].1), "A widget.");
        assert_eq!(
            doc.node(entries[1].1).as_scalar().unwrap().style,
            ScalarStyle::DoubleQuoted
        );
        assert_eq!(doc.node(entries[2].1).tag.as_deref(), Some("!builtin"));

        let values = items(doc.node(entries[3].1));
        assert_eq!(values.len(), 2);
        let second = entries_of(&doc, values[1]);
        assert_eq!(scalar(&doc, second[1].1), "it's");
    }

    fn entries_of(doc: &Document, id: NodeId) -> &[(NodeId, NodeId)] {
        entries(doc.node(id))
    }

    #[test]
    fn test_alias_is_same_node() {
        let doc =
            parse("!test-type {field_one: &abcd !test-type abcd, field_two: *abcd}").unwrap();
        let entries = entries(root(&doc));
        assert_eq!(entries[0].1, entries[1].1);
        assert_eq!(doc.node(entries[1].1).tag.as_deref(), Some("!test-type"));
    }

    #[test]
    fn test_undefined_alias() {
        let err = parse("{a: *missing}").unwrap_err();
        assert_eq!(err.code, ErrorCode::E01002);
        assert_eq!(err.location, Some(SourceLocation { line: 1, column: 5 }));
    }

    #[test]
    fn test_anchor_not_visible_inside_itself() {
        let err = parse("&a [*a]").unwrap_err();
        assert_eq!(err.code, ErrorCode::E01002);
    }

    #[test]
    fn test_syntax_error() {
        let err = parse("{a: b\n c: d}").unwrap_err();
        assert_eq!(err.code, ErrorCode::E01001);
        assert!(err.location.is_some());

        assert_eq!(parse("[a, b").unwrap_err().code, ErrorCode::E01001);
    }

    #[test]
    fn test_empty_values() {
        let doc = parse("{a: , b, c: ~, d: ''}").unwrap();
        let entries = entries(root(&doc));
        assert_eq!(scalar(&doc, entries[0].1), "");
        assert_eq!(scalar(&doc, entries[1].1), "");
        assert_eq!(scalar(&doc, entries[2].1), "~");
        assert_eq!(scalar(&doc, entries[3].1), "");
        assert_eq!(
            doc.node(entries[3].1).as_scalar().unwrap().style,
            ScalarStyle::SingleQuoted
        );
    }

    #[test]
    fn test_empty_document() {
        let doc = parse("  # nothing here\n").unwrap();
        assert!(root(&doc).is_empty_scalar());
        assert!(root(&doc).tag.is_none());
    }

    #[test]
    fn test_tag_without_content() {
        let doc = parse("!description").unwrap();
        assert_eq!(root(&doc).tag.as_deref(), Some("!description"));
        assert!(root(&doc).is_empty_scalar());
    }

    #[test]
    fn test_plain_scalar_characters() {
        let doc = parse("[-1, 0x2a, a:b, a#b, _IOW(x, y), x y  z]").unwrap();
        let values: Vec<&str> = items(root(&doc)).iter().map(|id| scalar(&doc, *id)).collect();
        assert_eq!(values, vec!["-1", "0x2a", "a:b", "a#b", "_IOW(x", "y)", "x y  z"]);
    }

    #[test]
    fn test_folded_lines() {
        let doc = parse("{description: first line\n    second line\n\n    new paragraph}").unwrap();
        let entries = entries(root(&doc));
        assert_eq!(
            scalar(&doc, entries[0].1),
            "first line second line\nnew paragraph"
        );
    }

    #[test]
    fn test_escapes() {
        let doc = parse(r#""a\tbé\x41\\""#).unwrap();
        assert_eq!(root(&doc).as_scalar().unwrap().value, "a\tb\u{e9}A\\");

        let err = parse(r#""\q""#).unwrap_err();
        assert_eq!(err.code, ErrorCode::E01003);
        assert_eq!(parse(r#""\u12""#).unwrap_err().code, ErrorCode::E01003);
    }

    #[test]
    fn test_locations() {
        let doc = parse("!struct {\n  name: s,\n  fields: [x]\n}").unwrap();
        let node = root(&doc);
        assert_eq!(node.location, SourceLocation { line: 1, column: 1 });
        let entries = entries(node);
        assert_eq!(doc.node(entries[1].0).location, SourceLocation { line: 3, column: 3 });
        let fields = items(doc.node(entries[1].1));
        assert_eq!(doc.node(fields[0]).location, SourceLocation { line: 3, column: 12 });
    }

    #[test]
    fn test_block_mapping_after_tag_line() {
        let input = "
            !enum
            name: test_enum
            description: Test enum.
            underlying_type: !builtin uint32_t
            values:
              - name: value0
                description: Test value 0.
              - name: value1
                description: Test value 1.
                value: 5
            ";

        let doc = parse(input).unwrap();
        let node = root(&doc);
        assert_eq!(node.tag.as_deref(), Some("!enum"));

        let entries = entries(node);
        let keys: Vec<&str> = entries.iter().map(|(k, _)| scalar(&doc, *k)).collect();
        assert_eq!(keys, vec!["name", "description", "underlying_type", "values"]);
        assert_eq!(scalar(&doc, entries[2].1), "uint32_t");
        assert_eq!(doc.node(entries[2].1).tag.as_deref(), Some("!builtin"));

        let values = items(doc.node(entries[3].1));
        assert_eq!(values.len(), 2);
        let second = entries_of(&doc, values[1]);
        assert_eq!(second.len(), 3);
        assert_eq!(scalar(&doc, second[2].1), "5");
    }

    #[test]
    fn test_indentless_sequence() {
        let doc = parse("items:\n- a\n- b\nnext: c\n").unwrap();
        let entries = entries(root(&doc));
        let values: Vec<&str> = items(doc.node(entries[0].1))
            .iter()
            .map(|id| scalar(&doc, *id))
            .collect();
        assert_eq!(values, vec!["a", "b"]);
        assert_eq!(scalar(&doc, entries[1].1), "c");
    }

    #[test]
    fn test_nested_block_collections() {
        let input = "\
root:
  child:
    - - x
      - y
    - key: !tag value
      other: [1, 2]
  empty:
last: '#not a comment' # comment
";
        let doc = parse(input).unwrap();
        let top = entries(root(&doc));
        assert_eq!(top.len(), 2);
        assert_eq!(scalar(&doc, top[1].1), "#not a comment");

        let inner = entries_of(&doc, top[0].1);
        assert!(doc.node(inner[1].1).is_empty_scalar());

        let child = items(doc.node(inner[0].1));
        let pair: Vec<&str> = items(doc.node(child[0]))
            .iter()
            .map(|id| scalar(&doc, *id))
            .collect();
        assert_eq!(pair, vec!["x", "y"]);

        let compact = entries_of(&doc, child[1]);
        assert_eq!(doc.node(compact[0].1).tag.as_deref(), Some("!tag"));
        assert_eq!(items(doc.node(compact[1].1)).len(), 2);
    }

    #[test]
    fn test_block_anchor_and_alias() {
        let input = "\
first: &shared !struct
  name: s
second: *shared
third: &word plain
fourth: *word
";
        let doc = parse(input).unwrap();
        let entries = entries(root(&doc));
        assert_eq!(entries[0].1, entries[1].1);
        assert_eq!(doc.node(entries[0].1).tag.as_deref(), Some("!struct"));
        assert_eq!(entries[2].1, entries[3].1);

        let err = parse("a: *nothing\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::E01002);
        assert_eq!(err.location, Some(SourceLocation { line: 1, column: 4 }));
    }

    #[test]
    fn test_block_plain_folding() {
        let doc = parse("description: first line\n  second line\n\n  new paragraph\nnext: x\n").unwrap();
        let entries = entries(root(&doc));
        assert_eq!(
            scalar(&doc, entries[0].1),
            "first line second line\nnew paragraph"
        );
        assert_eq!(scalar(&doc, entries[1].1), "x");
    }

    #[test]
    fn test_block_scalars() {
        let input = "\
literal: |
  line one
    indented

  line three
folded: >
  joined
  words

  kept break
stripped: |-
  text

kept: |+
  text

end: x
";
        let doc = parse(input).unwrap();
        let entries = entries(root(&doc));
        assert_eq!(scalar(&doc, entries[0].1), "line one\n  indented\n\nline three\n");
        assert_eq!(
            doc.node(entries[0].1).as_scalar().unwrap().style,
            ScalarStyle::Literal
        );
        assert_eq!(scalar(&doc, entries[1].1), "joined words\nkept break\n");
        assert_eq!(scalar(&doc, entries[2].1), "text");
        assert_eq!(scalar(&doc, entries[3].1), "text\n\n");
        assert_eq!(scalar(&doc, entries[4].1), "x");
    }

    #[test]
    fn test_block_locations() {
        let doc = parse("!struct\nname: s\nfields:\n  - x\n").unwrap();
        let node = root(&doc);
        assert_eq!(node.location, SourceLocation { line: 2, column: 1 });
        let entries = entries(node);
        assert_eq!(doc.node(entries[1].0).location, SourceLocation { line: 3, column: 1 });
        let fields = items(doc.node(entries[1].1));
        assert_eq!(doc.node(fields[0]).location, SourceLocation { line: 4, column: 5 });
    }

    #[test]
    fn test_flow_inside_block_locations() {
        let err = parse("a:\n  b: {c: [d, *missing]}\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::E01002);
        assert_eq!(err.location, Some(SourceLocation { line: 2, column: 14 }));
    }

    #[test]
    fn test_bad_indentation() {
        let err = parse("a:\n  b: 1\n c: 2\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::E01001);
        assert_eq!(err.location, Some(SourceLocation { line: 3, column: 2 }));

        let err = parse("a:\n  - x\n  y: 1\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::E01001);

        assert_eq!(parse("a: b: c\n").unwrap_err().code, ErrorCode::E01001);
        assert_eq!(parse("a: [1]  x\n").unwrap_err().code, ErrorCode::E01001);
    }

    #[test]
    fn test_document_markers() {
        let doc = parse("---\nname: x\n...\n").unwrap();
        assert_eq!(entries(root(&doc)).len(), 1);

        let err = parse("a: 1\n---\nb: 2\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::E01001);
        assert_eq!(err.location, Some(SourceLocation { line: 2, column: 1 }));
    }
}
