//! Newick export of taxonomy subtrees.
use std::collections::VecDeque;
use std::io::Write;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::base::{TaxonId, TaxonomyStore};
use crate::errors::{Error, ErrorKind, TaxonomyResult};
use crate::taxonomy::Taxonomy;

/// How subtree nodes are labelled in the exported newick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelStyle {
    /// `ott<id>`
    Id,
    /// the uniqname
    Name,
    /// `<uniqname> ott<id>`
    NameAndId,
}

impl FromStr for LabelStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "id" => Ok(LabelStyle::Id),
            "name" => Ok(LabelStyle::Name),
            "name_and_id" => Ok(LabelStyle::NameAndId),
            _ => Err(Error::new(ErrorKind::BadRequest(
                "label_format must be \"name_and_id\", \"name\" or \"id\"".to_string(),
            ))),
        }
    }
}

/// NewickToken is used as an intermediate while linearizing the traversal.
#[derive(PartialEq)]
enum NewickToken {
    Start,
    End,
    Delim,
    Label(String),
}

impl NewickToken {
    fn as_bytes(&self) -> &[u8] {
        match self {
            NewickToken::Start => b"(",
            NewickToken::End => b")",
            NewickToken::Delim => b",",
            NewickToken::Label(s) => s.as_bytes(),
        }
    }
}

fn format_label(tax: &TaxonomyStore, id: TaxonId, style: LabelStyle) -> String {
    let raw = match style {
        LabelStyle::Id => format!("ott{}", id),
        LabelStyle::Name => tax
            .taxon_by_id(id)
            .map(|t| t.uniqname().to_string())
            .unwrap_or_default(),
        LabelStyle::NameAndId => {
            let name = tax
                .taxon_by_id(id)
                .map(|t| t.uniqname().to_string())
                .unwrap_or_default();
            format!("{} ott{}", name, id)
        }
    };
    quote_if_needed(&raw)
}

// Newick reserves these; anything containing them (or a space) gets single
// quoted, with embedded quotes doubled.
fn quote_if_needed(label: &str) -> String {
    let needs_quotes = label
        .chars()
        .any(|c| matches!(c, ' ' | '(' | ')' | '[' | ']' | ':' | ';' | ',' | '\''));
    if !needs_quotes {
        return label.to_string();
    }
    let mut quoted = String::with_capacity(label.len() + 2);
    quoted.push('\'');
    for c in label.chars() {
        if c == '\'' {
            quoted.push('\'');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

/// Write the subtree rooted at `root` as newick to `writer`.
pub fn write_newick<W>(
    tax: &TaxonomyStore,
    writer: &mut W,
    root: TaxonId,
    style: LabelStyle,
) -> TaxonomyResult<()>
where
    W: Write,
{
    let mut out_buf: VecDeque<NewickToken> = VecDeque::new();
    for (node, pre) in tax.traverse(root)? {
        if pre {
            out_buf.push_back(NewickToken::Start);
        } else {
            out_buf.push_back(NewickToken::End);
            out_buf.push_back(NewickToken::Label(format_label(tax, node, style)));
            out_buf.push_back(NewickToken::Delim);
        }
    }

    let mut skip_next = false;
    while let Some(token) = out_buf.pop_front() {
        if skip_next {
            skip_next = false;
            continue;
        }
        let next_token = out_buf.front();
        // turn `()`s into `` (tips have no child list)
        if token == NewickToken::Start && next_token == Some(&NewickToken::End) {
            skip_next = true;
            continue;
        }
        // remove terminal commas from lists
        if token == NewickToken::Delim
            && (next_token == Some(&NewickToken::End) || next_token.is_none())
        {
            continue;
        }
        writer.write_all(token.as_bytes())?;
    }
    writer.write_all(b";")?;
    Ok(())
}

/// Convenience wrapper returning the newick as a `String`.
pub fn newick_string(
    tax: &TaxonomyStore,
    root: TaxonId,
    style: LabelStyle,
) -> TaxonomyResult<String> {
    let mut out: Vec<u8> = Vec::new();
    write_newick(tax, &mut out, root, style)?;
    String::from_utf8(out)
        .map_err(|e| Error::new(ErrorKind::Internal(format!("invalid newick utf-8: {}", e))))
}
