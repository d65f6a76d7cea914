//! Column selection by name, exclusion, or predicate over column metadata.
use std::fmt;
use std::sync::Arc;

use tidyframe_error::{ErrorKind, FrameError, Result};
use tracing::debug;

use crate::arrays::datatype::DataType;
use crate::arrays::table::Table;
use crate::expr::strings::compile_regex;

/// Metadata a selector predicate gets to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMeta<'a> {
    pub name: &'a str,
    pub datatype: DataType,
}

type MetaPredicate = dyn Fn(&ColumnMeta<'_>) -> bool + Send + Sync;

/// One entry of a selection request.
#[derive(Clone)]
pub enum SelectItem {
    /// Include a column by name.
    Name(String),
    /// Drop a column by name.
    Exclude(String),
    /// Include every column matching a predicate.
    Matching(Arc<MetaPredicate>),
}

impl fmt::Debug for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Self::Exclude(name) => f.debug_tuple("Exclude").field(name).finish(),
            Self::Matching(_) => write!(f, "Matching(..)"),
        }
    }
}

impl From<&str> for SelectItem {
    fn from(name: &str) -> Self {
        SelectItem::Name(name.to_string())
    }
}

impl From<String> for SelectItem {
    fn from(name: String) -> Self {
        SelectItem::Name(name)
    }
}

impl From<&String> for SelectItem {
    fn from(name: &String) -> Self {
        SelectItem::Name(name.clone())
    }
}

pub fn exclude(name: impl Into<String>) -> SelectItem {
    SelectItem::Exclude(name.into())
}

/// Select columns for which `f` returns true.
pub fn where_meta<F>(f: F) -> SelectItem
where
    F: Fn(&ColumnMeta<'_>) -> bool + Send + Sync + 'static,
{
    SelectItem::Matching(Arc::new(f))
}

pub fn starts_with(prefix: impl Into<String>) -> SelectItem {
    let prefix = prefix.into();
    where_meta(move |meta| meta.name.starts_with(&prefix))
}

pub fn ends_with(suffix: impl Into<String>) -> SelectItem {
    let suffix = suffix.into();
    where_meta(move |meta| meta.name.ends_with(&suffix))
}

pub fn contains(needle: impl Into<String>) -> SelectItem {
    let needle = needle.into();
    where_meta(move |meta| meta.name.contains(&needle))
}

/// Select columns whose name matches a regex.
///
/// Errors with `InvalidArgument` if the pattern doesn't compile.
pub fn matches(pattern: &str) -> Result<SelectItem> {
    let regex = compile_regex(pattern)?;
    Ok(where_meta(move |meta| regex.is_match(meta.name)))
}

pub fn of_type(datatype: DataType) -> SelectItem {
    where_meta(move |meta| meta.datatype == datatype)
}

/// Resolve a selection request to column names, in table order.
///
/// Inclusion items (names and predicates) are unioned. Exclusion items are
/// removed from the full column list. The two can't be mixed.
pub fn resolve_selection<'a>(table: &'a Table, items: &[SelectItem]) -> Result<Vec<&'a str>> {
    if items.is_empty() {
        return Err(FrameError::with_kind(
            ErrorKind::InvalidSelector,
            "Empty column selection",
        ));
    }

    let num_excludes = items
        .iter()
        .filter(|item| matches!(item, SelectItem::Exclude(_)))
        .count();
    if num_excludes != 0 && num_excludes != items.len() {
        return Err(FrameError::with_kind(
            ErrorKind::InvalidSelector,
            "Cannot mix column inclusion and exclusion",
        )
        .with_field("inclusions", items.len() - num_excludes)
        .with_field("exclusions", num_excludes));
    }

    // Every name must resolve, for inclusions and exclusions alike.
    for item in items {
        if let SelectItem::Name(name) | SelectItem::Exclude(name) = item {
            table.column(name)?;
        }
    }

    let excluding = num_excludes != 0;
    let selected = table
        .columns()
        .filter(|col| {
            let meta = ColumnMeta {
                name: col.name(),
                datatype: col.datatype(),
            };
            let hit = items.iter().any(|item| match item {
                SelectItem::Name(name) | SelectItem::Exclude(name) => name == meta.name,
                SelectItem::Matching(pred) => pred(&meta),
            });
            hit != excluding
        })
        .map(|col| col.name())
        .collect();

    Ok(selected)
}

impl Table {
    /// Project columns. The result keeps the table's column order.
    ///
    /// Use `with_columns` to reorder.
    pub fn select<I>(&self, items: impl IntoIterator<Item = I>) -> Result<Table>
    where
        I: Into<SelectItem>,
    {
        let items: Vec<SelectItem> = items.into_iter().map(Into::into).collect();
        let names = resolve_selection(self, &items)?;
        debug!(columns_in = self.num_columns(), columns_out = names.len(), "select");
        self.with_columns(&names)
    }
}
