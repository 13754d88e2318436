//! Line-oriented patch text.
//!
//! ```text
//! #N canvas 63 88 450 300 12;
//! #X obj 20 20 osc~ 440;
//! #X msg 20 60 \; pd dsp 1;
//! #X obj 20 100 dac~;
//! #X connect 0 0 2 0;
//! ```
//!
//! Each statement ends at an unescaped `;`. Inside text, `;`, `,`, `$` and
//! `\` are escaped with a backslash. `#X connect` names nodes by their
//! position in file order and iolets by their ordinal within one direction.
//!
//! Loading is two-phase: [`PatchDocument::parse`] turns text into
//! [`Statement`]s without touching any graph, then
//! [`PatchGraph::load_document`] applies them. A malformed statement therefore
//! leaves the target graph as it was.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::graph::{ConnectionFault, NodeKind, PatchGraph, Point};

/// Errors that can occur while reading patch text or encoded state.
#[derive(Debug, Error)]
pub enum PatchTextError {
    /// A statement had missing or non-numeric fields.
    #[error("statement {statement}: {reason}")]
    Malformed {
        /// 1-based statement number.
        statement: usize,
        /// What was wrong.
        reason: String,
    },
    /// A second `#N canvas` opened a subpatch.
    #[error("statement {statement}: subpatches are not supported")]
    NestedCanvas {
        /// 1-based statement number.
        statement: usize,
    },
    /// Encoded state was not valid base64.
    #[error("invalid base64 state: {0}")]
    Base64(#[from] base64::DecodeError),
    /// Decoded state was not UTF-8.
    #[error("state is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Canvas window geometry from the `#N canvas` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Canvas {
    /// Window left edge.
    pub x: i32,
    /// Window top edge.
    pub y: i32,
    /// Window width.
    pub width: i32,
    /// Window height.
    pub height: i32,
    /// Font size.
    pub font_size: i32,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            x: 63,
            y: 88,
            width: 450,
            height: 300,
            font_size: 12,
        }
    }
}

/// One parsed statement, excluding the canvas header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    /// `#X obj` or `#X msg`.
    Node {
        /// Object or message.
        kind: NodeKind,
        /// Top-left corner.
        position: Point,
        /// Type text or message content, unescaped, single-spaced.
        text: String,
    },
    /// A box that occupies a node index but is not modelled (comments,
    /// number and symbol atoms). Connections to it are skipped on load.
    Placeholder {
        /// The raw atoms, starting with `#X`.
        atoms: Vec<String>,
    },
    /// `#X connect`.
    Connect {
        /// Source node index.
        source: usize,
        /// Outlet ordinal on the source.
        outlet: usize,
        /// Destination node index.
        dest: usize,
        /// Inlet ordinal on the destination.
        inlet: usize,
    },
}

impl Statement {
    fn write_atoms(&self, out: &mut Vec<String>) {
        match self {
            Statement::Node {
                kind,
                position,
                text,
            } => {
                out.push("#X".into());
                out.push(kind.keyword().into());
                out.push(position.x.to_string());
                out.push(position.y.to_string());
                out.extend(text.split_whitespace().map(escape));
            }
            Statement::Placeholder { atoms } => out.extend(atoms.iter().map(|a| escape(a))),
            Statement::Connect {
                source,
                outlet,
                dest,
                inlet,
            } => {
                out.push("#X".into());
                out.push("connect".into());
                out.extend([source, outlet, dest, inlet].map(ToString::to_string));
            }
        }
    }
}

/// Box statements that take a node index without becoming a graph node.
const PLACEHOLDER_KEYWORDS: &[&str] = &["text", "floatatom", "symbolatom", "listbox"];

/// A connection that could not be applied on load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SkippedConnection {
    /// Source node index.
    pub source: usize,
    /// Outlet ordinal.
    pub outlet: usize,
    /// Destination node index.
    pub dest: usize,
    /// Inlet ordinal.
    pub inlet: usize,
    /// Why it was refused.
    pub fault: ConnectionFault,
}

/// Summary of a [`PatchGraph::load_document`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Nodes created.
    pub nodes: usize,
    /// Connections created.
    pub connections: usize,
    /// `#X connect` statements that did not resolve.
    pub skipped_connections: Vec<SkippedConnection>,
    /// Leading keywords of statements that were not modelled.
    pub skipped_statements: Vec<String>,
}

impl LoadReport {
    /// True if everything in the text made it into the graph.
    pub fn is_complete(&self) -> bool {
        self.skipped_connections.is_empty() && self.skipped_statements.is_empty()
    }
}

/// Parsed patch text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatchDocument {
    /// Header geometry; defaults if the text had no header.
    pub canvas: Canvas,
    /// Statements in file order.
    pub statements: Vec<Statement>,
    /// Keywords of statements that were dropped during parsing.
    pub skipped: Vec<String>,
}

impl PatchDocument {
    /// Parses patch text.
    pub fn parse(text: &str) -> Result<Self, PatchTextError> {
        let mut document = PatchDocument::default();
        let mut seen_canvas = false;

        for (i, atoms) in split_statements(text).into_iter().enumerate() {
            let statement = i + 1;
            let Some(head) = atoms.first() else {
                continue;
            };
            let keyword = atoms.get(1).map_or("", String::as_str);
            match (head.as_str(), keyword) {
                ("#N", "canvas") => {
                    if seen_canvas {
                        return Err(PatchTextError::NestedCanvas { statement });
                    }
                    seen_canvas = true;
                    let num = |n: usize| coord(&atoms, n, statement);
                    document.canvas = Canvas {
                        x: num(2)?,
                        y: num(3)?,
                        width: num(4)?,
                        height: num(5)?,
                        font_size: num(6)?,
                    };
                }
                ("#X", "obj" | "msg") => {
                    let kind = if keyword == "obj" {
                        NodeKind::Object
                    } else {
                        NodeKind::Message
                    };
                    let position = Point::new(
                        coord(&atoms, 2, statement)?,
                        coord(&atoms, 3, statement)?,
                    );
                    let text = atoms.get(4..).unwrap_or_default().join(" ");
                    document.statements.push(Statement::Node {
                        kind,
                        position,
                        text,
                    });
                }
                ("#X", "connect") => {
                    let idx = |n: usize| index(&atoms, n, statement);
                    document.statements.push(Statement::Connect {
                        source: idx(2)?,
                        outlet: idx(3)?,
                        dest: idx(4)?,
                        inlet: idx(5)?,
                    });
                }
                ("#X", kw) if PLACEHOLDER_KEYWORDS.contains(&kw) => {
                    tracing::warn!("patch_parse: statement {statement}: '#X {kw}' kept as placeholder");
                    document.skipped.push(format!("#X {kw}"));
                    document
                        .statements
                        .push(Statement::Placeholder { atoms: atoms.clone() });
                }
                (head, kw) => {
                    tracing::warn!("patch_parse: statement {statement}: skipping '{head} {kw}'");
                    document.skipped.push(format!("{head} {kw}"));
                }
            }
        }
        Ok(document)
    }

    /// Captures a graph's nodes (in order) and connections.
    pub fn from_graph(graph: &PatchGraph) -> Self {
        let mut index = HashMap::new();
        let mut statements = Vec::with_capacity(graph.node_count() + graph.connection_count());
        for (i, node) in graph.nodes().enumerate() {
            index.insert(node.id(), i);
            statements.push(Statement::Node {
                kind: node.kind(),
                position: node.position(),
                text: node.text().to_string(),
            });
        }
        for (_, conn) in graph.connections() {
            if let (Some(&source), Some(&dest)) =
                (index.get(&conn.source.node), index.get(&conn.dest.node))
            {
                statements.push(Statement::Connect {
                    source,
                    outlet: conn.source.index,
                    dest,
                    inlet: conn.dest.index,
                });
            }
        }
        Self {
            canvas: graph.canvas(),
            statements,
            skipped: Vec::new(),
        }
    }
}

impl fmt::Display for PatchDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.canvas;
        writeln!(
            f,
            "#N canvas {} {} {} {} {};",
            c.x, c.y, c.width, c.height, c.font_size
        )?;
        let mut atoms = Vec::new();
        for statement in &self.statements {
            atoms.clear();
            statement.write_atoms(&mut atoms);
            writeln!(f, "{};", atoms.join(" "))?;
        }
        Ok(())
    }
}

fn coord(atoms: &[String], n: usize, statement: usize) -> Result<i32, PatchTextError> {
    let atom = field(atoms, n, statement)?;
    atom.parse::<i32>()
        .ok()
        .or_else(|| atom.parse::<f64>().ok().map(|v| v.round() as i32))
        .ok_or_else(|| PatchTextError::Malformed {
            statement,
            reason: format!("field {n}: '{atom}' is not a number"),
        })
}

fn index(atoms: &[String], n: usize, statement: usize) -> Result<usize, PatchTextError> {
    let atom = field(atoms, n, statement)?;
    atom.parse::<usize>().map_err(|_| PatchTextError::Malformed {
        statement,
        reason: format!("field {n}: '{atom}' is not an index"),
    })
}

fn field(atoms: &[String], n: usize, statement: usize) -> Result<&str, PatchTextError> {
    atoms
        .get(n)
        .map(String::as_str)
        .ok_or_else(|| PatchTextError::Malformed {
            statement,
            reason: format!("expected at least {} fields, found {}", n + 1, atoms.len()),
        })
}

fn escape(atom: &str) -> String {
    let mut out = String::with_capacity(atom.len());
    for c in atom.chars() {
        if matches!(c, ';' | ',' | '$' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Splits text into statements of unescaped atoms.
///
/// Newlines are plain whitespace, so statements may wrap across lines.
fn split_statements(text: &str) -> Vec<Vec<String>> {
    let mut statements = Vec::new();
    let mut atoms = Vec::new();
    let mut atom = String::new();
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    atom.push(next);
                }
            }
            ';' => {
                if !atom.is_empty() {
                    atoms.push(std::mem::take(&mut atom));
                }
                statements.push(std::mem::take(&mut atoms));
            }
            c if c.is_whitespace() => {
                if !atom.is_empty() {
                    atoms.push(std::mem::take(&mut atom));
                }
            }
            c => atom.push(c),
        }
    }
    if !atom.is_empty() {
        atoms.push(atom);
    }
    if !atoms.is_empty() {
        statements.push(atoms);
    }
    statements
}
