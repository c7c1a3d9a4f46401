//! Paired field and relation table naming.

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::catalog::{FieldCatalog, LinkField};
use crate::error::Result;
use crate::store::Executor;

/// Prefix of every relation table.
pub const RELATION_TABLE_PREFIX: &str = "lk_";

/// Separator between the two table names in a relation table name.
pub const RELATION_TABLE_SEPARATOR: &str = "__";

/// Length of the random suffix in generated paired field names.
const DISAMBIGUATOR_LEN: usize = 5;

/// Relation table storing edges from `owner` rows to `reference` rows.
pub fn relation_table_between(owner: &str, reference: &str) -> String {
    format!("{RELATION_TABLE_PREFIX}{owner}{RELATION_TABLE_SEPARATOR}{reference}")
}

/// Forward relation table of a link field: `lk_<table>__<linkTable>`.
pub fn relation_table_name(field: &LinkField) -> String {
    relation_table_between(&field.table_name, &field.property.link_table_name)
}

/// Reverse relation table of a link field: `lk_<linkTable>__<table>`.
pub fn reverse_relation_table_name(field: &LinkField) -> String {
    relation_table_between(&field.property.link_table_name, &field.table_name)
}

/// Split a relation table name into `(owner, reference)` table names.
pub fn parse_relation_table_name(name: &str) -> Option<(&str, &str)> {
    let rest = name.strip_prefix(RELATION_TABLE_PREFIX)?;
    let (owner, reference) = rest.split_once(RELATION_TABLE_SEPARATOR)?;
    if owner.is_empty() || reference.is_empty() || reference.contains(RELATION_TABLE_SEPARATOR) {
        return None;
    }
    Some((owner, reference))
}

/// Short random lowercase suffix for generated field names.
pub fn disambiguator() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(DISAMBIGUATOR_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// Build the paired field of `field`.
///
/// The pair lives at `field.property`'s table and column and points back at
/// `field`. It is named after the table it links to (the display name, or
/// the raw table name when none is registered) plus a random suffix; the name
/// never takes part in identity.
pub fn paired_field(
    catalog: &dyn FieldCatalog,
    exec: &dyn Executor,
    field: &LinkField,
) -> Result<LinkField> {
    let table_name = catalog
        .resolve_table_display_name(exec, &field.table_name)?
        .unwrap_or_else(|| field.table_name.clone());
    Ok(field.mirror(format!("{}_{}", table_name, disambiguator())))
}

/// Look up the stored pair of `field`, falling back to its mirror when the
/// catalog has no entry for it.
pub fn resolve_paired_field(
    catalog: &dyn FieldCatalog,
    exec: &dyn Executor,
    field: &LinkField,
) -> Result<LinkField> {
    let stored = catalog.get_column(
        exec,
        &field.property.link_table_name,
        &field.property.link_column_name,
    )?;
    match stored {
        Some(def) if def.is_link() => {
            let paired = def.as_link()?;
            if paired.is_paired_with(field) {
                return Ok(paired);
            }
            tracing::warn!(
                table = %field.table_name,
                column = %field.table_column_name,
                paired_table = %paired.table_name,
                paired_column = %paired.table_column_name,
                "stored paired field does not point back; using mirror"
            );
            Ok(field.mirror(paired.name))
        }
        _ => Ok(field.mirror(field.name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SqlCatalog;
    use crate::store::RelationStore;

    fn field() -> LinkField {
        LinkField::new("Tags", "tb_posts", "link_tags", "tb_tags", "link_posts")
    }

    #[test]
    fn test_relation_table_names() {
        let f = field();
        assert_eq!(relation_table_name(&f), "lk_tb_posts__tb_tags");
        assert_eq!(reverse_relation_table_name(&f), "lk_tb_tags__tb_posts");
        assert_eq!(relation_table_name(&f.mirror("x")), reverse_relation_table_name(&f));
    }

    #[test]
    fn test_parse_relation_table_name() {
        assert_eq!(
            parse_relation_table_name("lk_tb_posts__tb_tags"),
            Some(("tb_posts", "tb_tags"))
        );
        assert_eq!(parse_relation_table_name("tb_posts__tb_tags"), None);
        assert_eq!(parse_relation_table_name("lk_tb_posts"), None);
        assert_eq!(parse_relation_table_name("lk___tb_tags"), None);
        assert_eq!(parse_relation_table_name("lk_a__b__c"), None);
    }

    #[test]
    fn test_disambiguator_shape() {
        let suffix = disambiguator();
        assert_eq!(suffix.len(), DISAMBIGUATOR_LEN);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_paired_field_round_trip() {
        let store = RelationStore::open_in_memory().unwrap();
        let catalog = SqlCatalog::new();
        catalog.register_table(&store, "tb_posts", "Posts").unwrap();

        let f = field();
        let paired = paired_field(&catalog, &store, &f).unwrap();
        assert_eq!(paired.table_name, "tb_tags");
        assert_eq!(paired.table_column_name, "link_posts");
        assert!(paired.name.starts_with("Posts_"));
        assert_eq!(paired.name.len(), "Posts_".len() + DISAMBIGUATOR_LEN);

        let back = paired_field(&catalog, &store, &paired).unwrap();
        assert_eq!(back.table_name, f.table_name);
        assert_eq!(back.table_column_name, f.table_column_name);
        assert_eq!(back.property, f.property);
    }

    #[test]
    fn test_paired_field_without_display_name() {
        let store = RelationStore::open_in_memory().unwrap();
        let paired = paired_field(&SqlCatalog::new(), &store, &field()).unwrap();
        assert!(paired.name.starts_with("tb_posts_"));
    }

    #[test]
    fn test_resolve_paired_falls_back_to_mirror() {
        let store = RelationStore::open_in_memory().unwrap();
        let f = field();
        let paired = resolve_paired_field(&SqlCatalog::new(), &store, &f).unwrap();
        assert!(f.is_paired_with(&paired));
    }
}
