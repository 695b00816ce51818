//! CodeSnippets XML read/write.
//!
//! The on-disk snippet format is an XML document with a `CodeSnippets`
//! root containing one or more `CodeSnippet` elements, each with a
//! `Header` (title, shortcut, keywords, ...) and a `Snippet` body
//! (declarations, imports, references, and the code itself). This module
//! converts between that document and [`crate::model::Snippet`] records;
//! nothing outside it touches XML.
//!
//! Unknown elements are skipped. Missing optional elements default to
//! empty. Code is always written as CDATA.

use std::path::Path;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{SnipError, SnipResult};
use crate::model::{
    AlternativeShortcut, LITERAL_TYPE_SENTINEL, Literal, SNIPPET_TYPE_EXPANSION, Snippet,
};

/// Namespace of the CodeSnippets schema.
pub const SNIPPET_XML_NAMESPACE: &str =
    "http://schemas.microsoft.com/VisualStudio/2005/CodeSnippet";

/// Format version stamped on each `CodeSnippet` element.
const SNIPPET_FORMAT_VERSION: &str = "1.0.0";

/// Read and parse the snippet file at `path`.
pub fn read_snippet_file(path: &Path) -> SnipResult<Vec<Snippet>> {
    let text = std::fs::read_to_string(path).map_err(|e| SnipError::io(path, e))?;
    parse_snippets(&text, path)
}

/// Serialize `snippets` as a CodeSnippets document at `path`.
pub fn write_snippet_file(path: &Path, snippets: &[Snippet]) -> SnipResult<()> {
    let xml = to_xml(snippets)?;
    std::fs::write(path, xml).map_err(|e| SnipError::io(path, e))
}

fn malformed(origin: &Path, reason: impl Into<String>) -> SnipError {
    SnipError::MalformedSnippetFile {
        path: origin.to_path_buf(),
        reason: reason.into(),
    }
}

fn attr_value(start: &BytesStart<'_>, name: &str, origin: &Path) -> SnipResult<Option<String>> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| malformed(origin, e.to_string()))?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| malformed(origin, e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Parse a CodeSnippets document. `origin` is the path reported in
/// malformed-file errors (callers parsing in-memory text pass a
/// placeholder).
pub fn parse_snippets(text: &str, origin: &Path) -> SnipResult<Vec<Snippet>> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut snippets: Vec<Snippet> = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut saw_root = false;
    let mut current: Option<Snippet> = None;
    let mut literal: Option<Literal> = None;
    let mut alternative: Option<AlternativeShortcut> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| malformed(origin, e.to_string()))?;
        match event {
            Event::Start(ref start) => {
                let name = element_name(start);
                start_element(
                    &name,
                    start,
                    &path,
                    origin,
                    &mut saw_root,
                    &mut current,
                    &mut literal,
                    &mut alternative,
                )?;
                path.push(name);
            }
            Event::Empty(ref start) => {
                // Attribute-only form, e.g. <Code Language="CSharp"/>.
                let name = element_name(start);
                start_element(
                    &name,
                    start,
                    &path,
                    origin,
                    &mut saw_root,
                    &mut current,
                    &mut literal,
                    &mut alternative,
                )?;
                path.push(name);
                end_element(&path, &mut current, &mut literal, &mut alternative);
                path.pop();
            }
            Event::Text(ref t) => {
                let value = t
                    .unescape()
                    .map_err(|e| malformed(origin, e.to_string()))?
                    .into_owned();
                assign_text(&path, &value, &mut current, &mut literal, &mut alternative);
            }
            Event::CData(t) => {
                let value = String::from_utf8_lossy(&t.into_inner()).into_owned();
                assign_text(&path, &value, &mut current, &mut literal, &mut alternative);
            }
            Event::End(_) => {
                end_element(&path, &mut current, &mut literal, &mut alternative);
                let Some(closed) = path.pop() else {
                    return Err(malformed(origin, "unbalanced closing element"));
                };
                if closed == "CodeSnippet" {
                    if let Some(snippet) = current.take() {
                        snippets.push(finish_snippet(snippet));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(malformed(origin, "missing CodeSnippets root element"));
    }
    Ok(snippets)
}

fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

#[allow(clippy::too_many_arguments)]
fn start_element(
    name: &str,
    start: &BytesStart<'_>,
    path: &[String],
    origin: &Path,
    saw_root: &mut bool,
    current: &mut Option<Snippet>,
    literal: &mut Option<Literal>,
    alternative: &mut Option<AlternativeShortcut>,
) -> SnipResult<()> {
    let parent = path.last().map(String::as_str);
    match name {
        "CodeSnippets" => *saw_root = true,
        "CodeSnippet" => {
            let mut snippet = Snippet::default();
            snippet.snippet_types.clear();
            *current = Some(snippet);
        }
        "Code" if parent == Some("Snippet") => {
            if let Some(snippet) = current.as_mut() {
                if let Some(lang) = attr_value(start, "Language", origin)? {
                    snippet.code_language = lang;
                }
                if let Some(kind) = attr_value(start, "Kind", origin)? {
                    snippet.code_kind = kind;
                }
                if let Some(delim) = attr_value(start, "Delimiter", origin)? {
                    snippet.set_delimiter_str(&delim);
                }
            }
        }
        "Literal" | "Object" if parent == Some("Declarations") => {
            let mut lit = Literal::for_identifier("");
            lit.tooltip = String::new();
            lit.default_value = String::new();
            lit.is_object = name == "Object";
            if lit.is_object {
                lit.type_name = String::new();
            }
            lit.editable = match attr_value(start, "Editable", origin)? {
                Some(v) => !v.eq_ignore_ascii_case("false"),
                None => true,
            };
            *literal = Some(lit);
        }
        "Shortcut" if parent == Some("AlternativeShortcuts") => {
            *alternative = Some(AlternativeShortcut {
                name: String::new(),
                value: attr_value(start, "Value", origin)?.unwrap_or_default(),
            });
        }
        _ => {}
    }
    Ok(())
}

fn end_element(
    path: &[String],
    current: &mut Option<Snippet>,
    literal: &mut Option<Literal>,
    alternative: &mut Option<AlternativeShortcut>,
) {
    let name = path.last().map_or("", String::as_str);
    let parent = path
        .len()
        .checked_sub(2)
        .map(|i| path[i].as_str())
        .unwrap_or("");
    match name {
        "Literal" | "Object" if parent == "Declarations" => {
            if let (Some(mut lit), Some(snippet)) = (literal.take(), current.as_mut()) {
                if !lit.is_object {
                    lit.type_name = LITERAL_TYPE_SENTINEL.to_owned();
                }
                if !lit.id.trim().is_empty() {
                    snippet.literals.push(lit);
                }
            }
        }
        "Shortcut" if parent == "AlternativeShortcuts" => {
            if let (Some(alt), Some(snippet)) = (alternative.take(), current.as_mut()) {
                if !alt.name.is_empty() {
                    snippet.alternative_shortcuts.push(alt);
                }
            }
        }
        _ => {}
    }
}

fn assign_text(
    path: &[String],
    value: &str,
    current: &mut Option<Snippet>,
    literal: &mut Option<Literal>,
    alternative: &mut Option<AlternativeShortcut>,
) {
    let Some(elem) = path.last().map(String::as_str) else {
        return;
    };
    let parent = path
        .len()
        .checked_sub(2)
        .map(|i| path[i].as_str())
        .unwrap_or("");

    if let Some(lit) = literal.as_mut() {
        match elem {
            "ID" => lit.id = value.to_owned(),
            "ToolTip" => lit.tooltip = value.to_owned(),
            "Default" => lit.default_value = value.to_owned(),
            "Function" => lit.function = value.to_owned(),
            "Type" => lit.type_name = value.to_owned(),
            _ => {}
        }
        return;
    }

    if let Some(alt) = alternative.as_mut() {
        if elem == "Shortcut" {
            alt.name = value.to_owned();
        }
        return;
    }

    let Some(snippet) = current.as_mut() else {
        return;
    };
    match (parent, elem) {
        ("Header", "Title") => snippet.title = value.to_owned(),
        ("Header", "Author") => snippet.author = value.to_owned(),
        ("Header", "Description") => snippet.description = value.to_owned(),
        ("Header", "HelpUrl") => snippet.help_url = value.to_owned(),
        ("Header", "Shortcut") => snippet.shortcut = value.to_owned(),
        ("Keywords", "Keyword") => snippet.keywords.push(value.to_owned()),
        ("SnippetTypes", "SnippetType") => snippet.snippet_types.push(value.to_owned()),
        ("Import", "Namespace") => snippet.imports.push(value.to_owned()),
        ("Reference", "Assembly") => snippet.references.push(value.to_owned()),
        // CDATA may arrive in several chunks; append.
        ("Snippet", "Code") => snippet.code.push_str(value),
        _ => {}
    }
}

fn finish_snippet(mut snippet: Snippet) -> Snippet {
    if snippet.snippet_types.is_empty() {
        snippet
            .snippet_types
            .push(SNIPPET_TYPE_EXPANSION.to_owned());
    }
    snippet
}

/// Serialize `snippets` as a CodeSnippets document string.
pub fn to_xml(snippets: &[Snippet]) -> SnipResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)),
    )?;

    let mut root = BytesStart::new("CodeSnippets");
    root.push_attribute(("xmlns", SNIPPET_XML_NAMESPACE));
    emit(&mut writer, Event::Start(root))?;

    for snippet in snippets {
        write_snippet(&mut writer, snippet)?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("CodeSnippets")))?;

    let bytes = writer.into_inner();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> SnipResult<()> {
    writer
        .write_event(event)
        .map_err(|e| SnipError::Xml(e.into()))
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &str) -> SnipResult<()> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(value)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn write_snippet(writer: &mut Writer<Vec<u8>>, snippet: &Snippet) -> SnipResult<()> {
    let mut code_snippet = BytesStart::new("CodeSnippet");
    code_snippet.push_attribute(("Format", SNIPPET_FORMAT_VERSION));
    emit(writer, Event::Start(code_snippet))?;

    emit(writer, Event::Start(BytesStart::new("Header")))?;
    write_text_element(writer, "Title", &snippet.title)?;
    if !snippet.shortcut.is_empty() {
        write_text_element(writer, "Shortcut", &snippet.shortcut)?;
    }
    write_text_element(writer, "Description", &snippet.description)?;
    write_text_element(writer, "Author", &snippet.author)?;
    if !snippet.help_url.is_empty() {
        write_text_element(writer, "HelpUrl", &snippet.help_url)?;
    }
    if !snippet.snippet_types.is_empty() {
        emit(writer, Event::Start(BytesStart::new("SnippetTypes")))?;
        for snippet_type in &snippet.snippet_types {
            write_text_element(writer, "SnippetType", snippet_type)?;
        }
        emit(writer, Event::End(BytesEnd::new("SnippetTypes")))?;
    }
    if !snippet.keywords.is_empty() {
        emit(writer, Event::Start(BytesStart::new("Keywords")))?;
        for keyword in &snippet.keywords {
            write_text_element(writer, "Keyword", keyword)?;
        }
        emit(writer, Event::End(BytesEnd::new("Keywords")))?;
    }
    if !snippet.alternative_shortcuts.is_empty() {
        emit(writer, Event::Start(BytesStart::new("AlternativeShortcuts")))?;
        for alt in &snippet.alternative_shortcuts {
            let mut shortcut = BytesStart::new("Shortcut");
            if !alt.value.is_empty() {
                shortcut.push_attribute(("Value", alt.value.as_str()));
            }
            emit(writer, Event::Start(shortcut))?;
            emit(writer, Event::Text(BytesText::new(&alt.name)))?;
            emit(writer, Event::End(BytesEnd::new("Shortcut")))?;
        }
        emit(writer, Event::End(BytesEnd::new("AlternativeShortcuts")))?;
    }
    emit(writer, Event::End(BytesEnd::new("Header")))?;

    emit(writer, Event::Start(BytesStart::new("Snippet")))?;
    if !snippet.literals.is_empty() {
        emit(writer, Event::Start(BytesStart::new("Declarations")))?;
        for literal in &snippet.literals {
            write_literal(writer, literal)?;
        }
        emit(writer, Event::End(BytesEnd::new("Declarations")))?;
    }
    if !snippet.imports.is_empty() {
        emit(writer, Event::Start(BytesStart::new("Imports")))?;
        for import in &snippet.imports {
            emit(writer, Event::Start(BytesStart::new("Import")))?;
            write_text_element(writer, "Namespace", import)?;
            emit(writer, Event::End(BytesEnd::new("Import")))?;
        }
        emit(writer, Event::End(BytesEnd::new("Imports")))?;
    }
    if !snippet.references.is_empty() {
        emit(writer, Event::Start(BytesStart::new("References")))?;
        for reference in &snippet.references {
            emit(writer, Event::Start(BytesStart::new("Reference")))?;
            write_text_element(writer, "Assembly", reference)?;
            emit(writer, Event::End(BytesEnd::new("Reference")))?;
        }
        emit(writer, Event::End(BytesEnd::new("References")))?;
    }

    let mut code = BytesStart::new("Code");
    code.push_attribute(("Language", snippet.code_language.as_str()));
    if !snippet.code_kind.is_empty() {
        code.push_attribute(("Kind", snippet.code_kind.as_str()));
    }
    code.push_attribute(("Delimiter", snippet.delimiter().to_string().as_str()));
    emit(writer, Event::Start(code))?;
    emit(writer, Event::CData(BytesCData::new(&snippet.code)))?;
    emit(writer, Event::End(BytesEnd::new("Code")))?;

    emit(writer, Event::End(BytesEnd::new("Snippet")))?;
    emit(writer, Event::End(BytesEnd::new("CodeSnippet")))
}

fn write_literal(writer: &mut Writer<Vec<u8>>, literal: &Literal) -> SnipResult<()> {
    let element = if literal.is_object { "Object" } else { "Literal" };
    let mut start = BytesStart::new(element);
    start.push_attribute(("Editable", if literal.editable { "true" } else { "false" }));
    emit(writer, Event::Start(start))?;

    write_text_element(writer, "ID", &literal.id)?;
    write_text_element(writer, "ToolTip", &literal.tooltip)?;
    write_text_element(writer, "Default", &literal.default_value)?;
    if !literal.function.is_empty() {
        write_text_element(writer, "Function", &literal.function)?;
    }
    if literal.is_object {
        write_text_element(writer, "Type", &literal.type_name)?;
    }

    emit(writer, Event::End(BytesEnd::new(element)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<CodeSnippets xmlns="http://schemas.microsoft.com/VisualStudio/2005/CodeSnippet">
  <CodeSnippet Format="1.0.0">
    <Header>
      <Title>For Loop</Title>
      <Shortcut>forl</Shortcut>
      <Description>Iterates over a range</Description>
      <Author>Someone</Author>
      <SnippetTypes>
        <SnippetType>Expansion</SnippetType>
      </SnippetTypes>
      <Keywords>
        <Keyword>loop</Keyword>
        <Keyword>iteration</Keyword>
      </Keywords>
    </Header>
    <Snippet>
      <Declarations>
        <Literal>
          <ID>index</ID>
          <ToolTip>Loop variable</ToolTip>
          <Default>i</Default>
        </Literal>
        <Object Editable="false">
          <ID>service</ID>
          <ToolTip>Service instance</ToolTip>
          <Default>svc</Default>
          <Type>IMyService</Type>
        </Object>
      </Declarations>
      <Imports>
        <Import>
          <Namespace>System.Linq</Namespace>
        </Import>
      </Imports>
      <Code Language="CSharp" Delimiter="$"><![CDATA[for (int $index$ = 0; $index$ < 10; $index$++) { }]]></Code>
    </Snippet>
  </CodeSnippet>
</CodeSnippets>
"#;

    fn origin() -> PathBuf {
        PathBuf::from("test.snippet")
    }

    #[test]
    fn test_parse_sample_snippet() {
        let snippets = parse_snippets(SAMPLE, &origin()).expect("sample should parse");
        assert_eq!(snippets.len(), 1);

        let s = &snippets[0];
        assert_eq!(s.title, "For Loop");
        assert_eq!(s.shortcut, "forl");
        assert_eq!(s.author, "Someone");
        assert_eq!(s.keywords, vec!["loop".to_owned(), "iteration".to_owned()]);
        assert_eq!(s.code_language, "CSharp");
        assert_eq!(s.delimiter(), '$');
        assert!(s.code.contains("$index$"));
        assert_eq!(s.imports, vec!["System.Linq".to_owned()]);

        assert_eq!(s.literals.len(), 2);
        let index = &s.literals[0];
        assert_eq!(index.id, "index");
        assert!(!index.is_object);
        assert!(index.editable);
        assert_eq!(index.type_name, LITERAL_TYPE_SENTINEL);

        let object = &s.literals[1];
        assert_eq!(object.id, "service");
        assert!(object.is_object);
        assert!(!object.editable);
        assert_eq!(object.type_name, "IMyService");
    }

    #[test]
    fn test_roundtrip_preserves_fields() {
        let parsed = parse_snippets(SAMPLE, &origin()).expect("sample should parse");
        let xml = to_xml(&parsed).expect("serialize");
        let reparsed = parse_snippets(&xml, &origin()).expect("reparse");
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn test_missing_root_is_malformed() {
        let err = parse_snippets("<NotSnippets/>", &origin()).unwrap_err();
        assert!(matches!(err, SnipError::MalformedSnippetFile { .. }));
    }

    #[test]
    fn test_invalid_xml_is_malformed() {
        let err = parse_snippets("<CodeSnippets><unclosed", &origin()).unwrap_err();
        assert!(matches!(err, SnipError::MalformedSnippetFile { .. }));
    }

    #[test]
    fn test_snippet_without_type_defaults_to_expansion() {
        let xml = r#"<CodeSnippets>
          <CodeSnippet>
            <Header><Title>T</Title></Header>
            <Snippet><Code Language="CSharp"><![CDATA[code]]></Code></Snippet>
          </CodeSnippet>
        </CodeSnippets>"#;
        let snippets = parse_snippets(xml, &origin()).expect("parse");
        assert_eq!(
            snippets[0].snippet_types,
            vec![SNIPPET_TYPE_EXPANSION.to_owned()]
        );
    }

    #[test]
    fn test_multiple_snippets_in_one_file() {
        let xml = r#"<CodeSnippets>
          <CodeSnippet>
            <Header><Title>First</Title></Header>
            <Snippet><Code Language="CSharp"><![CDATA[a]]></Code></Snippet>
          </CodeSnippet>
          <CodeSnippet>
            <Header><Title>Second</Title></Header>
            <Snippet><Code Language="VB"><![CDATA[b]]></Code></Snippet>
          </CodeSnippet>
        </CodeSnippets>"#;
        let snippets = parse_snippets(xml, &origin()).expect("parse");
        assert_eq!(snippets.len(), 2);
        assert_eq!(snippets[0].title, "First");
        assert_eq!(snippets[1].title, "Second");
        assert_eq!(snippets[1].code_language, "VB");
    }
}
