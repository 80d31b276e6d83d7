// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0

//! The node tree the parser builds and the formatter walks.
//!
//! Two kinds exist, mirroring the original dispatch-over-variants design:
//! a [`Token`] carries a literal text fragment, a leading spacing string and
//! a position; a [`Tree`] carries an ordered sequence of named children.
//! Indent level is never stored on a node — it lives in the rendering
//! [`crate::context::Context`] and is threaded in via the `indented` flag
//! on each child.

use std::fmt;

/// Concrete variant of a node. Leaves and trees share one tag space so
/// dispatch can match on a single enum, the way the original's
/// `NodeKind`-driven dispatch does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    // --- leaf / token kinds ---
    Date,
    Number,
    EscapedString,
    Account,
    Currency,
    Tag,
    Link,
    Flag,
    Keyword,
    Punct,
    MetaKey,
    Indent,
    Eol,
    BlockComment,
    InlineComment,
    // --- tree kinds, one per directive plus shared sub-structures ---
    File,
    Open,
    Close,
    Commodity,
    Pad,
    Balance,
    Price,
    Event,
    Query,
    Note,
    Document,
    Custom,
    Transaction,
    Posting,
    Include,
    Option,
    Plugin,
    Pushtag,
    Poptag,
    Pushmeta,
    Popmeta,
    MetaItem,
    UnitCost,
    TotalCost,
    NumberExpr,
    NumberAddExpr,
    NumberMulExpr,
    NumberUnaryExpr,
    NumberParenExpr,
    UnaryOp,
    AddOp,
    MulOp,
    LeftParen,
    RightParen,
}

impl NodeKind {
    /// Whether this kind is always surrounded by blank lines at the
    /// top level, per the block partitioner's boundary predicate.
    #[must_use]
    pub const fn always_surrounded(self) -> bool {
        matches!(self, Self::BlockComment | Self::Transaction)
    }

    /// Block-partitioner category: `push*`/`pop*` vs. declarations vs.
    /// bare directives vs. everything else.
    #[must_use]
    pub const fn category(self) -> &'static str {
        match self {
            Self::Pushtag | Self::Poptag | Self::Pushmeta | Self::Popmeta => "push_pop",
            Self::Open | Self::Close | Self::Commodity | Self::Pad | Self::Balance => {
                "declaration"
            }
            Self::Plugin | Self::Include | Self::Option => "directive",
            _ => "other",
        }
    }
}

/// A 0-indexed `(line, column)` position, in characters, of the first
/// character of a token's literal text (i.e. after its leading spacing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// A leaf node: literal text plus the whitespace that preceded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: NodeKind,
    pub text: String,
    pub spacing_before: String,
    pub position: Position,
}

impl Token {
    #[must_use]
    pub fn new(kind: NodeKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            spacing_before: String::new(),
            position: Position::default(),
        }
    }

    #[must_use]
    pub fn with_spacing(mut self, spacing: impl Into<String>) -> Self {
        self.spacing_before = spacing.into();
        self
    }

    /// The column immediately after this token's last character, i.e. the
    /// column a directly-following token (with empty spacing) would start
    /// at. Only meaningful for single-line tokens, which all of ours are.
    #[must_use]
    pub fn end_column(&self) -> usize {
        self.position.column + self.text.chars().count()
    }
}

/// A single named child slot in a [`Tree`]. `indented` marks children that
/// should render one indent level deeper than their parent. `blank_after`
/// is only meaningful for `File`'s `"entity"` children (which are never
/// `indented`, since nothing renders deeper than a top-level entity): it
/// records whether the parser saw two or more newlines before the next
/// entity, i.e. a user-authored blank line, which the block partitioner
/// in [`crate::format`] treats as a forced block boundary.
#[derive(Debug, Clone)]
pub struct Child {
    pub name: &'static str,
    pub node: Node,
    pub indented: bool,
    pub blank_after: bool,
}

impl Child {
    #[must_use]
    pub const fn new(name: &'static str, node: Node) -> Self {
        Self {
            name,
            node,
            indented: false,
            blank_after: false,
        }
    }

    #[must_use]
    pub const fn indented(mut self) -> Self {
        self.indented = true;
        self
    }

    #[must_use]
    pub const fn with_blank_after(mut self, blank_after: bool) -> Self {
        self.blank_after = blank_after;
        self
    }
}

/// An interior node: an ordered sequence of named children.
#[derive(Debug, Clone)]
pub struct Tree {
    pub kind: NodeKind,
    pub children: Vec<Child>,
}

impl Tree {
    #[must_use]
    pub const fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn push(mut self, name: &'static str, node: Node) -> Self {
        self.children.push(Child::new(name, node));
        self
    }

    #[must_use]
    pub fn push_indented(mut self, name: &'static str, node: Node) -> Self {
        self.children.push(Child::new(name, node).indented());
        self
    }

    /// The `(child, indented)` traversal the formatter dispatch recurses
    /// over by default.
    pub fn children_formatted(&self) -> impl Iterator<Item = (&Node, bool)> {
        self.children.iter().map(|c| (&c.node, c.indented))
    }

    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name).map(|c| &c.node)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> {
        self.children.iter().filter(move |c| c.name == name).map(|c| &c.node)
    }
}

/// Either a leaf or an interior node. An absent optional slot is
/// represented by [`Node::Missing`] rather than by omitting the [`Child`],
/// so fixed-arity constructors can always address a slot by name.
#[derive(Debug, Clone)]
pub enum Node {
    Token(Token),
    Tree(Box<Tree>),
    Missing,
}

impl Node {
    #[must_use]
    pub fn tree(kind: NodeKind) -> Self {
        Self::Tree(Box::new(Tree::new(kind)))
    }

    #[must_use]
    pub fn kind(&self) -> Option<NodeKind> {
        match self {
            Self::Token(t) => Some(t.kind),
            Self::Tree(t) => Some(t.kind),
            Self::Missing => None,
        }
    }

    #[must_use]
    pub const fn as_token(&self) -> Option<&Token> {
        match self {
            Self::Token(t) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            Self::Tree(t) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// The first token in document order under this node, used by
    /// [`crate::alignment`] to find the column to align from.
    #[must_use]
    pub fn first_token(&self) -> Option<&Token> {
        match self {
            Self::Token(t) => Some(t),
            Self::Tree(t) => t.children.iter().find_map(|c| c.node.first_token()),
            Self::Missing => None,
        }
    }

    /// The last token in document order under this node, used to find the
    /// column immediately after a node for right-alignment.
    #[must_use]
    pub fn last_token(&self) -> Option<&Token> {
        match self {
            Self::Token(t) => Some(t),
            Self::Tree(t) => t.children.iter().rev().find_map(|c| c.node.last_token()),
            Self::Missing => None,
        }
    }

    /// Flattens this node into its token stream, in document order,
    /// appending into `out`.
    pub fn flatten_into(&self, out: &mut Vec<Token>) {
        match self {
            Self::Token(t) => out.push(t.clone()),
            Self::Tree(t) => {
                for child in &t.children {
                    child.node.flatten_into(out);
                }
            }
            Self::Missing => {}
        }
    }

    #[must_use]
    pub fn flatten(&self) -> Vec<Token> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    /// The concatenated literal text of every token under this node, with
    /// no spacing in between. Used to recover a semantic value (e.g. a
    /// `time:` meta's raw string) from a subtree without the layout
    /// whitespace [`Self::to_string`] would include.
    #[must_use]
    pub fn plain_text(&self) -> String {
        self.flatten().iter().map(|t| t.text.as_str()).collect()
    }

    /// Mutates the spacing of the first token reachable under this node,
    /// adding `extra` spaces before it. The original header-alignment
    /// mechanism this models mutates a freshly re-parsed, throwaway header
    /// subtree; `crate::format::Writer` reaches the same result by tracking
    /// the output column directly instead (see `DESIGN.md`), so this method
    /// currently has no call site in `format.rs` — kept as the node-level
    /// primitive the mutation-based alignment scheme described in the spec
    /// is built from.
    pub fn pad_spacing_before(&mut self, extra: usize) {
        match self {
            Self::Token(t) => {
                t.spacing_before.push_str(&" ".repeat(extra));
            }
            Self::Tree(t) => {
                if let Some(first) = t.children.first_mut() {
                    first.node.pad_spacing_before(extra);
                }
            }
            Self::Missing => {}
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for tok in self.flatten() {
            write!(f, "{}{}", tok.spacing_before, tok.text)?;
        }
        Ok(())
    }
}
