// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Rendering context threaded by value through the formatter dispatch.
//! Indent depth lives here, never on a node.

use crate::options::FormatOptions;

#[derive(Debug, Clone, Copy)]
pub struct Context<'opts> {
    pub options: &'opts FormatOptions,
    indent: usize,
}

impl<'opts> Context<'opts> {
    #[must_use]
    pub const fn new(options: &'opts FormatOptions) -> Self {
        Self { options, indent: 0 }
    }

    /// A derived context one indent level deeper.
    #[must_use]
    pub const fn indented(self) -> Self {
        Self {
            options: self.options,
            indent: self.indent + 1,
        }
    }

    /// A derived context at `self`'s own level, or one deeper when
    /// `indent_child` is set — the shape every `children_formatted`
    /// traversal needs when propagating the `indented` flag.
    #[must_use]
    pub const fn with_indented(self, indent_child: bool) -> Self {
        if indent_child {
            self.indented()
        } else {
            self
        }
    }

    /// The literal indent string for the current depth: `options.indent`
    /// repeated `indent` times.
    #[must_use]
    pub fn get_indent(&self) -> String {
        self.options.indent.repeat(self.indent)
    }
}
