//! The layout document engine.
//!
//! Documents are trees of text, soft line breaks, indentation frames, and
//! groups; rendering walks the tree with a lookahead that flattens any group
//! whose contents fit on the current line. Highlighting is carried in the
//! tree and only realized (as ANSI styling) by the colored renderer, so it
//! never perturbs layout decisions.
use colored::Colorize;
use std::rc::Rc;
use Doc::*;

#[derive(Clone)]
pub enum Doc {
    Text(Rc<str>),
    Concat(DocPtr, DocPtr),
    Line(&'static str),
    Nest(usize, DocPtr),
    Group(DocPtr),
    Highlight(Hue, DocPtr),
}

/// The two styling classes the printer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hue {
    Generic,
    Keyword,
}

#[derive(Clone)]
pub struct DocPtr(Rc<Doc>);

impl std::convert::AsRef<Doc> for DocPtr {
    fn as_ref(&self) -> &Doc { self.0.as_ref() }
}

impl From<Doc> for DocPtr {
    fn from(d: Doc) -> DocPtr { DocPtr(Rc::new(d)) }
}

impl From<&str> for DocPtr {
    fn from(s: &str) -> DocPtr { DocPtr(Rc::new(Doc::Text(Rc::from(s)))) }
}

impl From<String> for DocPtr {
    fn from(s: String) -> DocPtr { DocPtr(Rc::new(Doc::Text(Rc::from(s)))) }
}

/// A soft break rendered as a single space when flattened.
pub fn line() -> DocPtr { Line(" ").into() }

/// A soft break that vanishes when flattened.
pub fn zero_width_line() -> DocPtr { Line("").into() }

pub fn space() -> DocPtr { DocPtr::from(" ") }

pub fn comma() -> DocPtr { DocPtr::from(",") }

pub fn colon() -> DocPtr { DocPtr::from(":") }

pub fn paren(d: DocPtr) -> DocPtr { DocPtr::from("(").concat(d).concat(")") }

pub fn highlight(d: impl Into<DocPtr>) -> DocPtr { Highlight(Hue::Generic, d.into()).into() }

pub fn highlight_keyword(d: impl Into<DocPtr>) -> DocPtr { Highlight(Hue::Keyword, d.into()).into() }

/// "Tile" a sequence of docs; example:
/// ```ignore
///   doc0 doc1 doc2 doc3 doc4 doc5 doc6 doc7\n\
///   doc8 doc9 doc10 doc11 doc12 doc13 doc14\n\
///   doc15 doc16 doc17 doc18 doc19"
/// ```
pub fn tile_docs(mut s: impl Iterator<Item = DocPtr>) -> DocPtr {
    match s.next() {
        None => DocPtr::from(""),
        Some(mut out) => {
            for next in s {
                out = out.concat(line().concat(next).group())
            }
            out
        }
    }
}

impl DocPtr {
    pub fn concat(&self, r: impl Into<Self>) -> Self { Doc::Concat(self.clone(), r.into()).into() }

    pub fn mk_nest(&self, idx: usize) -> Self { Nest(idx, self.clone()).into() }

    pub fn nest_group(&self, idx: usize) -> Self { self.group().mk_nest(idx) }

    pub fn concat_line(&self, other: impl Into<Self>) -> Self { self.concat(line()).concat(other) }

    pub fn concat_w_space(self, rhs: impl Into<Self>) -> Self { self.concat(DocPtr::from(" ")).concat(rhs) }

    pub fn group(&self) -> Self { Group(self.clone()).into() }

    /// Render with no styling.
    pub fn render(&self, line_width: usize) -> String { self.render_inner(line_width, false) }

    /// Render with ANSI styling for highlighted regions; layout is identical
    /// to `render`.
    pub fn render_colored(&self, line_width: usize) -> String { self.render_inner(line_width, true) }

    /// Rendering drives an explicit work list. Each task carries its
    /// indentation frame, whether an enclosing group already committed to a
    /// single line, and the innermost highlight. Styling is realized only
    /// when text is emitted, and the column budget is tracked separately
    /// from the output buffer, so escape bytes never influence layout.
    fn render_inner(&self, line_width: usize, colorize: bool) -> String {
        let mut acc = String::new();
        // columns still available on the current line
        let mut space_left = line_width;
        let mut work = vec![RenderTask { indent: 0, flat: false, hue: None, doc: self.clone() }];
        while let Some(RenderTask { indent, flat, hue, doc }) = work.pop() {
            match doc.as_ref() {
                Text(t) => {
                    match (colorize, hue) {
                        (true, Some(Hue::Generic)) => acc.push_str(t.as_ref().cyan().to_string().as_str()),
                        (true, Some(Hue::Keyword)) => acc.push_str(t.as_ref().blue().bold().to_string().as_str()),
                        _ => acc.push_str(t.as_ref()),
                    }
                    space_left = space_left.saturating_sub(t.len());
                }
                Line(alt) =>
                    if flat {
                        acc.push_str(alt);
                        space_left = space_left.saturating_sub(alt.len());
                    } else {
                        acc.push('\n');
                        for _ in 0..indent {
                            acc.push(' ');
                        }
                        space_left = line_width.saturating_sub(indent);
                    },
                Concat(a, b) => {
                    work.push(RenderTask { indent, flat, hue, doc: b.clone() });
                    work.push(RenderTask { indent, flat, hue, doc: a.clone() });
                }
                Nest(extra, d) => work.push(RenderTask { indent: indent + extra, flat, hue, doc: d.clone() }),
                Group(d) => {
                    let flat = flat || fits(space_left, d, work.as_slice());
                    work.push(RenderTask { indent, flat, hue, doc: d.clone() });
                }
                Highlight(h, d) => work.push(RenderTask { indent, flat, hue: Some(*h), doc: d.clone() }),
            }
        }
        acc
    }
}

/// One pending piece of the document during rendering.
struct RenderTask {
    indent: usize,
    flat: bool,
    hue: Option<Hue>,
    doc: DocPtr,
}

/// Whether a group body, rendered on one line, still leaves room for
/// whatever follows it up to the next break. The measure walks the body
/// and then the pending work nearest-first, stopping as soon as the budget
/// is spent or a break that will really be taken ends the line.
fn fits(space_left: usize, body: &DocPtr, pending: &[RenderTask]) -> bool {
    let mut budget = space_left as i64;
    let mut scan: Vec<(bool, DocPtr)> = pending.iter().map(|t| (t.flat, t.doc.clone())).collect();
    scan.push((true, body.clone()));
    while let Some((flat, d)) = scan.pop() {
        match d.as_ref() {
            Text(t) => budget -= t.len() as i64,
            Line(alt) =>
                if flat {
                    budget -= alt.len() as i64;
                } else {
                    return budget >= 0
                },
            Concat(a, b) => {
                scan.push((flat, b.clone()));
                scan.push((flat, a.clone()));
            }
            Nest(_, d) => scan.push((flat, d.clone())),
            // a group measures like its contents
            Group(d) => scan.push((flat, d.clone())),
            Highlight(_, d) => scan.push((flat, d.clone())),
        }
        if budget < 0 {
            return false
        }
    }
    budget >= 0
}
