//! SQL statement assembly.
//!
//! Every statement this layer issues is built here, from a [`TableConfig`]
//! and positional `$n` parameters. Backends execute these verbatim; the mock
//! store implements the same semantics natively and uses the builders only
//! through its tests.
//!
//! Filter sub-queries get deterministic aliases derived from a hash of the
//! attribute name so that several filters can join the same tables in one
//! query without colliding.

use attrix_core::{AttributeFilter, AttributeRecord, TableConfig, Value};
use sha2::{Digest, Sha256};

/// A renderable SQL statement with its bind parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

// ============================================================================
// LAZY LOAD
// ============================================================================

/// One-round-trip load of every attribute of an entity: value table joined
/// to the definition table, filtered by owner, in definition-id order.
pub fn load_attributes(config: &TableConfig, item_id: i64) -> Statement {
    let a = &config.attribute_columns;
    let v = &config.value_columns;
    let sql = format!(
        "SELECT attr.{id} AS id, attr.{name} AS name, attr.{ty} AS type, val.{val} AS value \
         FROM {value_table} AS val \
         JOIN {attribute_table} AS attr ON attr.{id} = val.{attr_id} \
         WHERE attr.{item_id} = $1 \
         ORDER BY attr.{id}",
        id = a.id,
        name = a.name,
        ty = a.type_tag,
        val = v.value,
        value_table = config.value_table,
        attribute_table = config.attribute_table,
        attr_id = v.attribute_id,
        item_id = a.item_id,
    );
    Statement {
        sql,
        params: vec![Value::Integer(item_id)],
    }
}

// ============================================================================
// WRITES
// ============================================================================

/// Insert the definition row for a not-yet-persisted record, returning the
/// generated id.
pub fn insert_definition(config: &TableConfig, record: &AttributeRecord) -> Statement {
    let a = &config.attribute_columns;
    let sql = format!(
        "INSERT INTO {table} ({item_id}, {ty}, {name}) VALUES ($1, $2, $3) RETURNING {id}",
        table = config.attribute_table,
        item_id = a.item_id,
        ty = a.type_tag,
        name = a.name,
        id = a.id,
    );
    Statement {
        sql,
        params: vec![
            Value::Integer(record.item_id),
            Value::Text(record.type_tag().as_str().to_string()),
            Value::Text(record.name.clone()),
        ],
    }
}

/// Insert the value row once the definition id is known.
pub fn insert_value(config: &TableConfig, attribute_id: i64, value: &Value) -> Statement {
    let v = &config.value_columns;
    let sql = format!(
        "INSERT INTO {table} ({attr_id}, {val}) VALUES ($1, $2)",
        table = config.value_table,
        attr_id = v.attribute_id,
        val = v.value,
    );
    Statement {
        sql,
        params: vec![
            Value::Integer(attribute_id),
            Value::Text(value.to_storage_text()),
        ],
    }
}

/// Update a persisted definition row; every column except the id.
pub fn update_definition(config: &TableConfig, id: i64, record: &AttributeRecord) -> Statement {
    let a = &config.attribute_columns;
    let sql = format!(
        "UPDATE {table} SET {item_id} = $1, {ty} = $2, {name} = $3 WHERE {id} = $4",
        table = config.attribute_table,
        item_id = a.item_id,
        ty = a.type_tag,
        name = a.name,
        id = a.id,
    );
    Statement {
        sql,
        params: vec![
            Value::Integer(record.item_id),
            Value::Text(record.type_tag().as_str().to_string()),
            Value::Text(record.name.clone()),
            Value::Integer(id),
        ],
    }
}

/// Update the value row paired with a definition.
pub fn update_value(config: &TableConfig, attribute_id: i64, value: &Value) -> Statement {
    let v = &config.value_columns;
    let sql = format!(
        "UPDATE {table} SET {val} = $1 WHERE {attr_id} = $2",
        table = config.value_table,
        val = v.value,
        attr_id = v.attribute_id,
    );
    Statement {
        sql,
        params: vec![
            Value::Text(value.to_storage_text()),
            Value::Integer(attribute_id),
        ],
    }
}

/// Delete value rows for one attribute of an entity, or for all of them.
/// Runs before [`delete_definitions`] so no value row is ever orphaned.
pub fn delete_values(config: &TableConfig, item_id: i64, name: Option<&str>) -> Statement {
    let a = &config.attribute_columns;
    let v = &config.value_columns;
    let mut sql = format!(
        "DELETE FROM {value_table} WHERE {attr_id} IN \
         (SELECT {id} FROM {attribute_table} WHERE {item_id} = $1",
        value_table = config.value_table,
        attr_id = v.attribute_id,
        id = a.id,
        attribute_table = config.attribute_table,
        item_id = a.item_id,
    );
    let mut params = vec![Value::Integer(item_id)];
    if let Some(name) = name {
        sql.push_str(&format!(" AND {} = $2", a.name));
        params.push(Value::Text(name.to_string()));
    }
    sql.push(')');
    Statement { sql, params }
}

/// Delete definition rows for one attribute of an entity, or for all of them.
pub fn delete_definitions(config: &TableConfig, item_id: i64, name: Option<&str>) -> Statement {
    let a = &config.attribute_columns;
    let mut sql = format!(
        "DELETE FROM {table} WHERE {item_id} = $1",
        table = config.attribute_table,
        item_id = a.item_id,
    );
    let mut params = vec![Value::Integer(item_id)];
    if let Some(name) = name {
        sql.push_str(&format!(" AND {} = $2", a.name));
        params.push(Value::Text(name.to_string()));
    }
    Statement { sql, params }
}

// ============================================================================
// QUERY COMPOSITION
// ============================================================================

/// Deterministic join alias for a filter on the given attribute name.
pub fn filter_alias(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    format!("f_{}", &hex::encode(digest)[..8])
}

/// Batch fetch: entities left-joined to their attributes, one row per
/// entity, attributes aggregated as a JSON array of
/// `{id, name, type, value}` objects. Each filter contributes an
/// inner-joined derived sub-query; filters AND together.
pub fn select_with_attributes(
    config: &TableConfig,
    filters: &[AttributeFilter],
    item_id: Option<i64>,
) -> Statement {
    let a = &config.attribute_columns;
    let v = &config.value_columns;

    let mut sql = format!(
        "SELECT entity.{pk} AS item_id, \
         COALESCE(json_agg(json_build_object(\
         'id', attr.{id}, 'name', attr.{name}, 'type', attr.{ty}, 'value', val.{val}\
         ) ORDER BY attr.{id}) FILTER (WHERE attr.{id} IS NOT NULL), '[]'::json) AS attributes \
         FROM {entity_table} AS entity \
         LEFT JOIN {attribute_table} AS attr ON attr.{item_id} = entity.{pk} \
         LEFT JOIN {value_table} AS val ON val.{attr_id} = attr.{id}",
        pk = config.primary_key,
        id = a.id,
        name = a.name,
        ty = a.type_tag,
        val = v.value,
        entity_table = config.entity_table,
        attribute_table = config.attribute_table,
        item_id = a.item_id,
        value_table = config.value_table,
        attr_id = v.attribute_id,
    );

    let mut params: Vec<Value> = Vec::new();

    for filter in filters {
        let alias = filter_alias(&filter.name);

        params.push(Value::Text(filter.name.clone()));
        let name_param = params.len();

        // Integer/Float comparands bind natively and compare under a numeric
        // cast of the stored text; everything else compares as text.
        let comparison = if filter.is_numeric() {
            params.push(filter.value.clone());
            format!(
                "CAST(fv.{val} AS DOUBLE PRECISION) {op} ${n}",
                val = v.value,
                op = filter.operator.as_sql(),
                n = params.len(),
            )
        } else {
            params.push(Value::Text(filter.value.to_storage_text()));
            format!(
                "fv.{val} {op} ${n}",
                val = v.value,
                op = filter.operator.as_sql(),
                n = params.len(),
            )
        };

        sql.push_str(&format!(
            " INNER JOIN (SELECT fa.{item_id} AS item_id \
             FROM {value_table} AS fv \
             JOIN {attribute_table} AS fa ON fa.{id} = fv.{attr_id} \
             WHERE fa.{name} = ${name_param} AND {comparison}) AS {alias} \
             ON {alias}.item_id = entity.{pk}",
            item_id = a.item_id,
            value_table = config.value_table,
            attribute_table = config.attribute_table,
            id = a.id,
            attr_id = v.attribute_id,
            name = a.name,
            name_param = name_param,
            comparison = comparison,
            alias = alias,
            pk = config.primary_key,
        ));
    }

    if let Some(item_id) = item_id {
        params.push(Value::Integer(item_id));
        sql.push_str(&format!(
            " WHERE entity.{pk} = ${n}",
            pk = config.primary_key,
            n = params.len(),
        ));
    }

    sql.push_str(&format!(
        " GROUP BY entity.{pk} ORDER BY entity.{pk}",
        pk = config.primary_key,
    ));

    Statement { sql, params }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use attrix_core::FilterOperator;

    fn config() -> TableConfig {
        TableConfig::for_entity_table("products")
    }

    #[test]
    fn test_load_attributes_statement() {
        let stmt = load_attributes(&config(), 7);
        assert_eq!(
            stmt.sql,
            "SELECT attr.id AS id, attr.name AS name, attr.type AS type, val.value AS value \
             FROM products_attribute_values AS val \
             JOIN products_attributes AS attr ON attr.id = val.products_attribute_id \
             WHERE attr.product_id = $1 \
             ORDER BY attr.id"
        );
        assert_eq!(stmt.params, vec![Value::Integer(7)]);
    }

    #[test]
    fn test_insert_pair_statements() {
        let record = AttributeRecord::new(7, "color", Value::from("red"));
        let def = insert_definition(&config(), &record);
        assert_eq!(
            def.sql,
            "INSERT INTO products_attributes (product_id, type, name) \
             VALUES ($1, $2, $3) RETURNING id"
        );
        assert_eq!(
            def.params,
            vec![
                Value::Integer(7),
                Value::Text("text".to_string()),
                Value::Text("color".to_string()),
            ]
        );

        let val = insert_value(&config(), 31, &record.value);
        assert_eq!(
            val.sql,
            "INSERT INTO products_attribute_values (products_attribute_id, value) \
             VALUES ($1, $2)"
        );
        assert_eq!(
            val.params,
            vec![Value::Integer(31), Value::Text("red".to_string())]
        );
    }

    #[test]
    fn test_update_pair_statements() {
        let mut record = AttributeRecord::loaded(31, 7, "count", Value::from(2));
        record.set_value(Value::from(3));

        let def = update_definition(&config(), 31, &record);
        assert_eq!(
            def.sql,
            "UPDATE products_attributes SET product_id = $1, type = $2, name = $3 WHERE id = $4"
        );
        assert_eq!(def.params[3], Value::Integer(31));

        let val = update_value(&config(), 31, &record.value);
        assert_eq!(
            val.sql,
            "UPDATE products_attribute_values SET value = $1 WHERE products_attribute_id = $2"
        );
        assert_eq!(
            val.params,
            vec![Value::Text("3".to_string()), Value::Integer(31)]
        );
    }

    #[test]
    fn test_delete_statements_scope_by_name() {
        let all = delete_definitions(&config(), 7, None);
        assert_eq!(all.sql, "DELETE FROM products_attributes WHERE product_id = $1");
        assert_eq!(all.params.len(), 1);

        let one = delete_definitions(&config(), 7, Some("color"));
        assert!(one.sql.ends_with("AND name = $2"));
        assert_eq!(one.params[1], Value::Text("color".to_string()));

        let values = delete_values(&config(), 7, Some("color"));
        assert_eq!(
            values.sql,
            "DELETE FROM products_attribute_values WHERE products_attribute_id IN \
             (SELECT id FROM products_attributes WHERE product_id = $1 AND name = $2)"
        );
    }

    #[test]
    fn test_filter_alias_is_deterministic() {
        let alias = filter_alias("color");
        assert_eq!(alias, filter_alias("color"));
        assert_ne!(alias, filter_alias("size"));
        assert_eq!(alias.len(), 10);
        assert!(alias.starts_with("f_"));
        assert!(alias[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_select_without_filters_aggregates_attributes() {
        let stmt = select_with_attributes(&config(), &[], None);
        assert!(stmt.sql.starts_with("SELECT entity.id AS item_id"));
        assert!(stmt.sql.contains("json_agg(json_build_object("));
        assert!(stmt.sql.contains("LEFT JOIN products_attributes AS attr"));
        assert!(stmt.sql.contains("LEFT JOIN products_attribute_values AS val"));
        assert!(stmt.sql.ends_with("GROUP BY entity.id ORDER BY entity.id"));
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_text_filter_composes_subquery() {
        let filters = vec![AttributeFilter::eq("color", "red")];
        let stmt = select_with_attributes(&config(), &filters, None);
        let alias = filter_alias("color");
        assert!(stmt.sql.contains(&format!("AS {} ON {}.item_id = entity.id", alias, alias)));
        assert!(stmt.sql.contains("WHERE fa.name = $1 AND fv.value = $2"));
        assert_eq!(
            stmt.params,
            vec![
                Value::Text("color".to_string()),
                Value::Text("red".to_string()),
            ]
        );
    }

    #[test]
    fn test_numeric_filter_casts_stored_text() {
        let filters = vec![AttributeFilter::new("size", FilterOperator::Gt, 10)];
        let stmt = select_with_attributes(&config(), &filters, None);
        assert!(stmt
            .sql
            .contains("CAST(fv.value AS DOUBLE PRECISION) > $2"));
        assert_eq!(stmt.params[1], Value::Integer(10));
    }

    #[test]
    fn test_two_filters_get_distinct_aliases_and_sequential_params() {
        let filters = vec![
            AttributeFilter::eq("color", "red"),
            AttributeFilter::new("size", FilterOperator::Gte, 10),
        ];
        let stmt = select_with_attributes(&config(), &filters, None);
        assert!(stmt.sql.contains(&filter_alias("color")));
        assert!(stmt.sql.contains(&filter_alias("size")));
        assert!(stmt.sql.contains("fa.name = $1"));
        assert!(stmt.sql.contains("fa.name = $3"));
        assert_eq!(stmt.params.len(), 4);
    }

    #[test]
    fn test_item_pin_appends_where_clause() {
        let stmt = select_with_attributes(&config(), &[], Some(7));
        assert!(stmt.sql.contains("WHERE entity.id = $1"));
        assert_eq!(stmt.params, vec![Value::Integer(7)]);
    }

    #[test]
    fn test_boolean_comparand_binds_storage_text() {
        let filters = vec![AttributeFilter::eq("active", true)];
        let stmt = select_with_attributes(&config(), &filters, None);
        assert!(stmt.sql.contains("fv.value = $2"));
        assert_eq!(stmt.params[1], Value::Text("true".to_string()));
    }
}
