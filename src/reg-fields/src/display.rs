// Copyright 2022 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// Box drawn table with one column per field, e.g.
///
/// ```text
/// ┌───────┬──────┬────────┬────────┐
/// │ Bit/s │   00 │ 01..04 │ 04..07 │
/// ├───────┼──────┼────────┼────────┤
/// │ Desc  │    A │      B │   KIND │
/// ├───────┼──────┼────────┼────────┤
/// │ Value │ true │      5 │    NMI │
/// └───────┴──────┴────────┴────────┘
/// ```
#[derive(Debug)]
pub(crate) struct Table {
    columns: Vec<[String; 3]>,
}

impl Table {
    pub(crate) fn new() -> Self {
        Self {
            columns: vec![[
                String::from("Bit/s"),
                String::from("Desc"),
                String::from("Value"),
            ]],
        }
    }

    pub(crate) fn column(&mut self, bits: &str, name: &str, value: &str) {
        self.columns
            .push([String::from(bits), String::from(name), String::from(value)]);
    }

    fn widths(&self) -> Vec<usize> {
        self.columns
            .iter()
            .map(|cells| cells.iter().map(|c| c.chars().count()).max().unwrap_or(0))
            .collect()
    }

    fn border(f: &mut fmt::Formatter<'_>, widths: &[usize], edges: [char; 3]) -> fmt::Result {
        let [left, middle, right] = edges;
        let segments = widths
            .iter()
            .map(|w| "─".repeat(w + 2))
            .collect::<Vec<_>>()
            .join(&middle.to_string());
        write!(f, "{left}{segments}{right}")
    }

    fn row(&self, f: &mut fmt::Formatter<'_>, widths: &[usize], row: usize) -> fmt::Result {
        write!(f, "│")?;
        for (i, (cells, w)) in self.columns.iter().zip(widths).enumerate() {
            if i == 0 {
                write!(f, " {:<w$} │", cells[row])?;
            } else {
                write!(f, " {:>w$} │", cells[row])?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();
        Self::border(f, &widths, ['┌', '┬', '┐'])?;
        writeln!(f)?;
        self.row(f, &widths, 0)?;
        writeln!(f)?;
        Self::border(f, &widths, ['├', '┼', '┤'])?;
        writeln!(f)?;
        self.row(f, &widths, 1)?;
        writeln!(f)?;
        Self::border(f, &widths, ['├', '┼', '┤'])?;
        writeln!(f)?;
        self.row(f, &widths, 2)?;
        writeln!(f)?;
        Self::border(f, &widths, ['└', '┴', '┘'])
    }
}

/// Prefixes every line of `text` with `width` spaces.
pub(crate) fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| format!("{pad}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
