// SPDX-License-Identifier: MIT OR Apache-2.0
//! XML reader/writer for the document format.
//!
//! The format is a flat hierarchy of elements with attribute-only payloads:
//! `<nodegraph>`, `<nodedef>`, node elements tagged by category,
//! `<input>`/`<output>` children, and legacy `<material>`/`<shaderref>`
//! declarations. No text content is carried, so a small hand-rolled
//! tokenizer covers the whole format.

use crate::document::Document;
use crate::element::{
    BindInput, DefInput, DefOutput, DocNode, GraphOutput, Input, InputBinding, LegacyMaterial,
    NodeDef, NodeGraph, ShaderRef,
};
use crate::types::ValueType;
use crate::DocumentError;
use std::fmt::Write as _;

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn unescape(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn write_input(out: &mut String, indent: &str, name: &str, input: &Input) {
    let _ = write!(
        out,
        "{indent}<input name=\"{}\" type=\"{}\"",
        escape(name),
        input.ty
    );
    match &input.binding {
        InputBinding::Value(v) => {
            let _ = write!(out, " value=\"{}\"", escape(v));
        }
        InputBinding::Node { node, output } => {
            let _ = write!(out, " nodename=\"{}\"", escape(node));
            if let Some(o) = output {
                let _ = write!(out, " output=\"{}\"", escape(o));
            }
        }
        InputBinding::Graph { nodegraph, output } => {
            let _ = write!(
                out,
                " nodegraph=\"{}\" output=\"{}\"",
                escape(nodegraph),
                escape(output)
            );
        }
    }
    out.push_str(" />\n");
}

fn write_node(out: &mut String, indent: &str, node: &DocNode) {
    let _ = write!(
        out,
        "{indent}<{} name=\"{}\" type=\"{}\"",
        node.category,
        escape(&node.name),
        node.ty
    );
    if node.inputs.is_empty() {
        out.push_str(" />\n");
        return;
    }
    out.push_str(">\n");
    let inner = format!("{indent}  ");
    for (name, input) in &node.inputs {
        write_input(out, &inner, name, input);
    }
    let _ = writeln!(out, "{indent}</{}>", node.category);
}

fn write_nodegraph(out: &mut String, ng: &NodeGraph) {
    let _ = write!(out, "  <nodegraph name=\"{}\"", escape(&ng.name));
    if !ng.fileprefix.is_empty() {
        let _ = write!(out, " fileprefix=\"{}\"", escape(&ng.fileprefix));
    }
    if let Some(nd) = &ng.nodedef {
        let _ = write!(out, " nodedef=\"{}\"", escape(nd));
    }
    out.push_str(">\n");
    for node in ng.nodes.values() {
        write_node(out, "    ", node);
    }
    for o in ng.outputs.values() {
        let _ = write!(
            out,
            "    <output name=\"{}\" type=\"{}\" nodename=\"{}\"",
            escape(&o.name),
            o.ty,
            escape(&o.node)
        );
        if let Some(inner) = &o.output {
            let _ = write!(out, " output=\"{}\"", escape(inner));
        }
        out.push_str(" />\n");
    }
    out.push_str("  </nodegraph>\n");
}

fn write_nodedef(out: &mut String, def: &NodeDef) {
    let _ = writeln!(
        out,
        "  <nodedef name=\"{}\" node=\"{}\" type=\"{}\">",
        escape(&def.name),
        escape(&def.category),
        def.ty
    );
    for input in &def.inputs {
        let _ = write!(
            out,
            "    <input name=\"{}\" type=\"{}\"",
            escape(&input.name),
            input.ty
        );
        if let Some(v) = &input.default {
            let _ = write!(out, " value=\"{}\"", escape(v));
        }
        if input.uniform {
            out.push_str(" uniform=\"true\"");
        }
        out.push_str(" />\n");
    }
    for output in &def.outputs {
        let _ = writeln!(
            out,
            "    <output name=\"{}\" type=\"{}\" />",
            escape(&output.name),
            output.ty
        );
    }
    out.push_str("  </nodedef>\n");
}

fn write_material(out: &mut String, mat: &LegacyMaterial) {
    let _ = writeln!(out, "  <material name=\"{}\">", escape(&mat.name));
    for sr in &mat.shader_refs {
        let _ = writeln!(
            out,
            "    <shaderref name=\"{}\" node=\"{}\">",
            escape(&sr.name),
            escape(&sr.category)
        );
        for bi in &sr.inputs {
            let _ = write!(
                out,
                "      <bindinput name=\"{}\" type=\"{}\"",
                escape(&bi.name),
                bi.ty
            );
            if let Some(v) = &bi.value {
                let _ = write!(out, " value=\"{}\"", escape(v));
            }
            if let Some(ng) = &bi.nodegraph {
                let _ = write!(out, " nodegraph=\"{}\"", escape(ng));
            }
            if let Some(o) = &bi.output {
                let _ = write!(out, " output=\"{}\"", escape(o));
            }
            out.push_str(" />\n");
        }
        out.push_str("    </shaderref>\n");
    }
    out.push_str("  </material>\n");
}

/// Serialize a document to XML text.
pub fn write_document(doc: &Document) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\"?>\n");
    let _ = write!(out, "<materialx version=\"{}\"", escape(&doc.version));
    if !doc.fileprefix.is_empty() {
        let _ = write!(out, " fileprefix=\"{}\"", escape(&doc.fileprefix));
    }
    out.push_str(">\n");
    for href in &doc.includes {
        let _ = writeln!(out, "  <xi:include href=\"{}\" />", escape(href));
    }
    for def in doc.nodedefs.values() {
        write_nodedef(&mut out, def);
    }
    for ng in doc.nodegraphs.values() {
        write_nodegraph(&mut out, ng);
    }
    for node in doc.nodes.values() {
        write_node(&mut out, "  ", node);
    }
    for mat in doc.materials.values() {
        write_material(&mut out, mat);
    }
    out.push_str("</materialx>\n");
    out
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Tag {
    name: String,
    attrs: Vec<(String, String)>,
    self_closing: bool,
}

impl Tag {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn require(&self, name: &str) -> Result<&str, DocumentError> {
        self.attr(name).ok_or_else(|| {
            DocumentError::Parse(format!(
                "element <{}> is missing attribute '{name}'",
                self.name
            ))
        })
    }

    fn ty(&self) -> Result<ValueType, DocumentError> {
        ValueType::parse(self.require("type")?)
    }
}

#[derive(Debug)]
enum Token {
    Open(Tag),
    Close(String),
    Eof,
}

struct Tokenizer<'a> {
    text: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text: text.as_bytes(),
            pos: 0,
        }
    }

    fn err(&self, msg: &str) -> DocumentError {
        DocumentError::Parse(format!("{msg} at byte {}", self.pos))
    }

    fn skip_ws(&mut self) {
        while self.pos < self.text.len() && self.text[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn skip_until(&mut self, pat: &str) -> Result<(), DocumentError> {
        let rest = &self.text[self.pos..];
        let rest = std::str::from_utf8(rest).map_err(|_| self.err("invalid utf-8"))?;
        match rest.find(pat) {
            Some(i) => {
                self.pos += i + pat.len();
                Ok(())
            }
            None => Err(self.err("unterminated markup")),
        }
    }

    fn name(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.text.len() {
            let c = self.text[self.pos];
            if c.is_ascii_alphanumeric() || c == b'_' || c == b':' || c == b'-' || c == b'.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.text[start..self.pos]).into_owned()
    }

    fn next(&mut self) -> Result<Token, DocumentError> {
        loop {
            // scan to the next tag, ignoring text content
            while self.pos < self.text.len() && self.text[self.pos] != b'<' {
                self.pos += 1;
            }
            if self.pos >= self.text.len() {
                return Ok(Token::Eof);
            }
            self.pos += 1;
            if self.text[self.pos..].starts_with(b"?") {
                self.skip_until("?>")?;
                continue;
            }
            if self.text[self.pos..].starts_with(b"!--") {
                self.skip_until("-->")?;
                continue;
            }
            if self.text[self.pos..].starts_with(b"/") {
                self.pos += 1;
                let name = self.name();
                self.skip_ws();
                if self.pos < self.text.len() && self.text[self.pos] == b'>' {
                    self.pos += 1;
                    return Ok(Token::Close(name));
                }
                return Err(self.err("malformed closing tag"));
            }

            let name = self.name();
            if name.is_empty() {
                return Err(self.err("malformed tag"));
            }
            let mut attrs = Vec::new();
            loop {
                self.skip_ws();
                if self.pos >= self.text.len() {
                    return Err(self.err("unterminated tag"));
                }
                match self.text[self.pos] {
                    b'>' => {
                        self.pos += 1;
                        return Ok(Token::Open(Tag {
                            name,
                            attrs,
                            self_closing: false,
                        }));
                    }
                    b'/' => {
                        self.pos += 1;
                        self.skip_ws();
                        if self.pos < self.text.len() && self.text[self.pos] == b'>' {
                            self.pos += 1;
                            return Ok(Token::Open(Tag {
                                name,
                                attrs,
                                self_closing: true,
                            }));
                        }
                        return Err(self.err("malformed self-closing tag"));
                    }
                    _ => {
                        let attr_name = self.name();
                        if attr_name.is_empty() {
                            return Err(self.err("malformed attribute"));
                        }
                        self.skip_ws();
                        if self.pos >= self.text.len() || self.text[self.pos] != b'=' {
                            return Err(self.err("attribute without value"));
                        }
                        self.pos += 1;
                        self.skip_ws();
                        if self.pos >= self.text.len() || self.text[self.pos] != b'"' {
                            return Err(self.err("attribute value must be quoted"));
                        }
                        self.pos += 1;
                        let start = self.pos;
                        while self.pos < self.text.len() && self.text[self.pos] != b'"' {
                            self.pos += 1;
                        }
                        if self.pos >= self.text.len() {
                            return Err(self.err("unterminated attribute value"));
                        }
                        let raw = String::from_utf8_lossy(&self.text[start..self.pos]).into_owned();
                        self.pos += 1;
                        attrs.push((attr_name, unescape(&raw)));
                    }
                }
            }
        }
    }

    /// Consume tokens until the matching close of an already-opened element.
    fn skip_element(&mut self, name: &str) -> Result<(), DocumentError> {
        let mut depth = 1usize;
        loop {
            match self.next()? {
                Token::Open(tag) => {
                    if !tag.self_closing {
                        depth += 1;
                    }
                }
                Token::Close(n) => {
                    depth -= 1;
                    if depth == 0 {
                        if n == name {
                            return Ok(());
                        }
                        return Err(self.err("mismatched closing tag"));
                    }
                }
                Token::Eof => return Err(self.err("unexpected end of document")),
            }
        }
    }
}

fn parse_input(tag: &Tag) -> Result<(String, Input), DocumentError> {
    let name = tag.require("name")?.to_string();
    let ty = tag.ty()?;
    let binding = if let Some(v) = tag.attr("value") {
        InputBinding::Value(v.to_string())
    } else if let Some(node) = tag.attr("nodename") {
        InputBinding::Node {
            node: node.to_string(),
            output: tag.attr("output").map(str::to_string),
        }
    } else if let Some(ng) = tag.attr("nodegraph") {
        InputBinding::Graph {
            nodegraph: ng.to_string(),
            output: tag.require("output")?.to_string(),
        }
    } else {
        return Err(DocumentError::Parse(format!(
            "input '{name}' has neither a value nor a connection"
        )));
    };
    Ok((name, Input { ty, binding }))
}

fn parse_node(tk: &mut Tokenizer, tag: Tag) -> Result<DocNode, DocumentError> {
    let mut node = DocNode::new(tag.require("name")?, tag.name.clone(), tag.ty()?);
    if tag.self_closing {
        return Ok(node);
    }
    loop {
        match tk.next()? {
            Token::Open(child) if child.name == "input" => {
                let (name, input) = parse_input(&child)?;
                node.inputs.insert(name, input);
                if !child.self_closing {
                    tk.skip_element("input")?;
                }
            }
            Token::Open(child) => {
                // unknown child elements are ignored
                if !child.self_closing {
                    tk.skip_element(&child.name)?;
                }
            }
            Token::Close(n) if n == tag.name => return Ok(node),
            Token::Close(_) => return Err(tk.err("mismatched closing tag")),
            Token::Eof => return Err(tk.err("unexpected end of document")),
        }
    }
}

fn parse_nodegraph(tk: &mut Tokenizer, tag: Tag) -> Result<NodeGraph, DocumentError> {
    let mut ng = NodeGraph::new(tag.require("name")?);
    ng.fileprefix = tag.attr("fileprefix").unwrap_or_default().to_string();
    ng.nodedef = tag.attr("nodedef").map(str::to_string);
    if tag.self_closing {
        return Ok(ng);
    }
    loop {
        match tk.next()? {
            Token::Open(child) if child.name == "output" => {
                let name = child.require("name")?.to_string();
                ng.outputs.insert(
                    name.clone(),
                    GraphOutput {
                        name,
                        ty: child.ty()?,
                        node: child.require("nodename")?.to_string(),
                        output: child.attr("output").map(str::to_string),
                    },
                );
                if !child.self_closing {
                    tk.skip_element("output")?;
                }
            }
            Token::Open(child) => {
                let node = parse_node(tk, child)?;
                ng.nodes.insert(node.name.clone(), node);
            }
            Token::Close(n) if n == "nodegraph" => return Ok(ng),
            Token::Close(_) => return Err(tk.err("mismatched closing tag")),
            Token::Eof => return Err(tk.err("unexpected end of document")),
        }
    }
}

fn parse_nodedef(tk: &mut Tokenizer, tag: Tag) -> Result<NodeDef, DocumentError> {
    let mut def = NodeDef {
        name: tag.require("name")?.to_string(),
        category: tag.require("node")?.to_string(),
        ty: tag.ty()?,
        inputs: Vec::new(),
        outputs: Vec::new(),
    };
    if tag.self_closing {
        return Ok(def);
    }
    loop {
        match tk.next()? {
            Token::Open(child) if child.name == "input" => {
                def.inputs.push(DefInput {
                    name: child.require("name")?.to_string(),
                    ty: child.ty()?,
                    uniform: child.attr("uniform") == Some("true"),
                    default: child.attr("value").map(str::to_string),
                });
                if !child.self_closing {
                    tk.skip_element("input")?;
                }
            }
            Token::Open(child) if child.name == "output" => {
                def.outputs.push(DefOutput {
                    name: child.require("name")?.to_string(),
                    ty: child.ty()?,
                });
                if !child.self_closing {
                    tk.skip_element("output")?;
                }
            }
            Token::Open(child) => {
                if !child.self_closing {
                    tk.skip_element(&child.name)?;
                }
            }
            Token::Close(n) if n == "nodedef" => return Ok(def),
            Token::Close(_) => return Err(tk.err("mismatched closing tag")),
            Token::Eof => return Err(tk.err("unexpected end of document")),
        }
    }
}

fn parse_shaderref(tk: &mut Tokenizer, tag: Tag) -> Result<ShaderRef, DocumentError> {
    let mut sr = ShaderRef {
        name: tag.require("name")?.to_string(),
        category: tag.require("node")?.to_string(),
        inputs: Vec::new(),
    };
    if tag.self_closing {
        return Ok(sr);
    }
    loop {
        match tk.next()? {
            Token::Open(child) if child.name == "bindinput" => {
                sr.inputs.push(BindInput {
                    name: child.require("name")?.to_string(),
                    ty: child.ty()?,
                    value: child.attr("value").map(str::to_string),
                    nodegraph: child.attr("nodegraph").map(str::to_string),
                    output: child.attr("output").map(str::to_string),
                });
                if !child.self_closing {
                    tk.skip_element("bindinput")?;
                }
            }
            Token::Open(child) => {
                if !child.self_closing {
                    tk.skip_element(&child.name)?;
                }
            }
            Token::Close(n) if n == "shaderref" => return Ok(sr),
            Token::Close(_) => return Err(tk.err("mismatched closing tag")),
            Token::Eof => return Err(tk.err("unexpected end of document")),
        }
    }
}

fn parse_material(tk: &mut Tokenizer, tag: Tag) -> Result<LegacyMaterial, DocumentError> {
    let mut mat = LegacyMaterial {
        name: tag.require("name")?.to_string(),
        shader_refs: Vec::new(),
    };
    if tag.self_closing {
        return Ok(mat);
    }
    loop {
        match tk.next()? {
            Token::Open(child) if child.name == "shaderref" => {
                mat.shader_refs.push(parse_shaderref(tk, child)?);
            }
            Token::Open(child) => {
                if !child.self_closing {
                    tk.skip_element(&child.name)?;
                }
            }
            Token::Close(n) if n == "material" => return Ok(mat),
            Token::Close(_) => return Err(tk.err("mismatched closing tag")),
            Token::Eof => return Err(tk.err("unexpected end of document")),
        }
    }
}

/// Parse a document from XML text.
pub fn read_document(text: &str) -> Result<Document, DocumentError> {
    let mut tk = Tokenizer::new(text);
    let root = loop {
        match tk.next()? {
            Token::Open(tag) if tag.name == "materialx" => break tag,
            Token::Open(_) => return Err(tk.err("expected <materialx> root element")),
            Token::Close(_) => return Err(tk.err("unexpected closing tag")),
            Token::Eof => return Err(tk.err("empty document")),
        }
    };

    let mut doc = Document::new();
    if let Some(v) = root.attr("version") {
        doc.version = v.to_string();
    }
    doc.fileprefix = root.attr("fileprefix").unwrap_or_default().to_string();
    if root.self_closing {
        return Ok(doc);
    }

    loop {
        match tk.next()? {
            Token::Open(tag) => match tag.name.as_str() {
                "xi:include" => {
                    doc.includes.push(tag.require("href")?.to_string());
                    if !tag.self_closing {
                        tk.skip_element("xi:include")?;
                    }
                }
                "nodedef" => {
                    let def = parse_nodedef(&mut tk, tag)?;
                    doc.nodedefs.insert(def.name.clone(), def);
                }
                "nodegraph" => {
                    let ng = parse_nodegraph(&mut tk, tag)?;
                    doc.nodegraphs.insert(ng.name.clone(), ng);
                }
                "material" => {
                    let mat = parse_material(&mut tk, tag)?;
                    doc.materials.insert(mat.name.clone(), mat);
                }
                _ => {
                    let node = parse_node(&mut tk, tag)?;
                    doc.nodes.insert(node.name.clone(), node);
                }
            },
            Token::Close(n) if n == "materialx" => return Ok(doc),
            Token::Close(_) => return Err(tk.err("mismatched closing tag")),
            Token::Eof => return Err(tk.err("unexpected end of document")),
        }
    }
}
