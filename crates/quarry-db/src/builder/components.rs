//! Built-in builder components.
//!
//! | method | order | renders |
//! |---|---|---|
//! | `before` | 1 | verbatim text |
//! | `select` | 10 | `SELECT a, b AS c` |
//! | `insert` | 11 | `INSERT INTO t` |
//! | `columns` | 12 | `(a, b)` |
//! | `values` | 13 | `VALUES (?, ?)` |
//! | `update` | 14 | `UPDATE t` |
//! | `set` | 15 | `SET a = ?` |
//! | `delete` | 16 | `DELETE FROM t` |
//! | `from` | 20 | `FROM t` |
//! | `join` | 30 | `LEFT JOIN t ON ...` |
//! | `where` | 40 | `WHERE a = ? AND b > ?` |
//! | `group` | 50 | `GROUP BY a` |
//! | `having` | 60 | `HAVING n > ?` |
//! | `order` | 70 | `ORDER BY a DESC` |
//! | `limit` | 80 | `LIMIT 10` |
//! | `offset` | 85 | `OFFSET 20` |
//! | `returning` | 90 | `RETURNING id` |
//! | `after` | 99 | verbatim text |

use once_cell::sync::Lazy;
use regex::Regex;

use quarry_core::QuarryResult;

use super::args::{split_tokens, BuilderArg};
use super::component::{ComponentDef, Resolution};
use crate::value::Value;

/// Names of all built-in components, in render order.
pub const BUILTIN_METHODS: &[&str] = &[
    "before", "select", "insert", "columns", "values", "update", "set", "delete", "from", "join",
    "where", "group", "having", "order", "limit", "offset", "returning", "after",
];

/// Comparison operators accepted in `where`/`having` criteria.
const OPERATORS: &[&str] = &[
    "=", "!=", "<>", "<", "<=", ">", ">=", "LIKE", "NOT LIKE", "ILIKE", "IN", "NOT IN", "IS",
    "IS NOT",
];

static JOIN_STRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\w+)\.(\w+)\s*(<=>|<=|=>|=)\s*(\w+)\.(\w+)$").unwrap()
});

/// Returns definitions for every built-in component.
pub fn builtin_components() -> Vec<ComponentDef> {
    vec![
        before(),
        select(),
        insert(),
        columns(),
        values(),
        update(),
        set(),
        delete(),
        from(),
        join(),
        criteria("where", 40, "WHERE"),
        group(),
        criteria("having", 60, "HAVING"),
        order(),
        counter("limit", 80, "LIMIT"),
        counter("offset", 85, "OFFSET"),
        returning(),
        after(),
    ]
}

// ── Shared helpers ─────────────────────────────────────────────────────

fn quote_all(s: &str, res: &Resolution<'_>) -> Vec<String> {
    split_tokens(s).iter().map(|t| res.quote(t)).collect()
}

fn quote_values(items: &[Value], res: &Resolution<'_>) -> Vec<String> {
    items.iter().map(|v| res.quote(&text_item(v))).collect()
}

fn length_error(items: &[Value], res: &Resolution<'_>) -> quarry_core::QuarryError {
    let n = items.len().to_string();
    res.fail("array", &[("n", n.as_str())])
}

fn text_item(value: &Value) -> String {
    value.as_str().map_or_else(|| value.to_string(), str::to_string)
}

fn verbatim(name: &'static str, order: u8) -> ComponentDef {
    ComponentDef::new(name, order)
        .on_string(|s, _| Ok(vec![s.to_string()]))
        .raw_verbatim()
}

// ── Statement heads ────────────────────────────────────────────────────

fn before() -> ComponentDef {
    verbatim("before", 1)
}

fn after() -> ComponentDef {
    verbatim("after", 99)
}

fn select() -> ComponentDef {
    ComponentDef::new("select", 10)
        .keyword("SELECT")
        .joiner(", ")
        .on_string(|s, res| Ok(quote_all(s, res)))
        .on_array(|items, res| {
            if items.len() != 2 {
                return Err(length_error(items, res));
            }
            Ok(vec![format!(
                "{} AS {}",
                res.quote(&text_item(&items[0])),
                res.dialect().quote_ident(&text_item(&items[1]))
            )])
        })
        .on_object(|pairs, res| {
            pairs
                .iter()
                .map(|(column, alias)| {
                    let alias = alias
                        .as_str()
                        .ok_or_else(|| res.fail("alias", &[("column", column.as_str())]))?;
                    Ok(format!(
                        "{} AS {}",
                        res.quote(column),
                        res.dialect().quote_ident(alias)
                    ))
                })
                .collect()
        })
        .raw_verbatim()
        .message(
            "array",
            "Invalid array with {n} items specified for query builder \"{method}\" component. Expected [column, alias]: {arg}",
        )
        .message(
            "alias",
            "Invalid alias for column \"{column}\" in query builder \"{method}\" component: {arg}",
        )
}

fn insert() -> ComponentDef {
    ComponentDef::new("insert", 11)
        .keyword("INSERT INTO")
        .joiner(", ")
        .on_string(|s, res| Ok(quote_all(s, res)))
}

fn columns() -> ComponentDef {
    ComponentDef::new("columns", 12)
        .keyword("(")
        .joiner(", ")
        .closing(")")
        .on_string(|s, res| Ok(quote_all(s, res)))
        .on_array(|items, res| Ok(quote_values(items, res)))
}

fn values() -> ComponentDef {
    ComponentDef::new("values", 13)
        .keyword("VALUES (")
        .joiner(", ")
        .closing(")")
        // One open placeholder per named column.
        .on_string(|s, res| Ok(split_tokens(s).iter().map(|_| res.placeholder()).collect()))
        .on_array(|items, res| Ok(items.iter().map(|v| res.bind(v.clone())).collect()))
}

fn update() -> ComponentDef {
    ComponentDef::new("update", 14)
        .keyword("UPDATE")
        .joiner(", ")
        .on_string(|s, res| Ok(quote_all(s, res)))
}

fn set() -> ComponentDef {
    ComponentDef::new("set", 15)
        .keyword("SET")
        .joiner(", ")
        .on_string(|s, res| {
            Ok(split_tokens(s)
                .iter()
                .map(|column| format!("{} = {}", res.quote(column), res.placeholder()))
                .collect())
        })
        .on_array(|items, res| {
            if items.len() != 2 {
                return Err(length_error(items, res));
            }
            let column = res.quote(&text_item(&items[0]));
            Ok(vec![format!("{column} = {}", res.bind(items[1].clone()))])
        })
        .on_object(|pairs, res| {
            let mut tokens = Vec::with_capacity(pairs.len());
            for (column, value) in pairs {
                let pair = BuilderArg::Array(vec![Value::from(column.as_str()), value.clone()]);
                tokens.extend(res.resolve_nested(&pair)?);
            }
            Ok(tokens)
        })
        .raw_verbatim()
        .message(
            "array",
            "Invalid array with {n} items specified for query builder \"{method}\" component. Expected [column, value]: {arg}",
        )
}

fn delete() -> ComponentDef {
    ComponentDef::new("delete", 16)
        .keyword("DELETE FROM")
        .joiner(", ")
        .on_string(|s, res| Ok(quote_all(s, res)))
}

// ── Sources ────────────────────────────────────────────────────────────

fn from() -> ComponentDef {
    ComponentDef::new("from", 20)
        .keyword("FROM")
        .joiner(", ")
        .on_string(|s, res| Ok(quote_all(s, res)))
        .on_array(|items, res| {
            if items.len() != 2 {
                return Err(length_error(items, res));
            }
            Ok(vec![format!(
                "{} AS {}",
                res.quote(&text_item(&items[0])),
                res.dialect().quote_ident(&text_item(&items[1]))
            )])
        })
        .on_object(|pairs, res| {
            Ok(pairs
                .iter()
                .map(|(table, alias)| {
                    format!("{} AS {}", res.quote(table), res.dialect().quote_ident(&text_item(alias)))
                })
                .collect())
        })
        .raw_verbatim()
        .message(
            "array",
            "Invalid array with {n} items specified for query builder \"{method}\" component. Expected [table, alias]: {arg}",
        )
}

fn join_keyword(kind: &str, res: &Resolution<'_>) -> QuarryResult<&'static str> {
    match kind.to_ascii_lowercase().as_str() {
        "" | "inner" | "=" => Ok("JOIN"),
        "left" | "<=" => Ok("LEFT JOIN"),
        "right" | "=>" => Ok("RIGHT JOIN"),
        "full" | "<=>" => Ok("FULL JOIN"),
        _ => Err(res.fail("type", &[("type", kind)])),
    }
}

fn render_join(
    kind: &str,
    from: &str,
    table: &str,
    to: &str,
    res: &Resolution<'_>,
) -> QuarryResult<String> {
    let keyword = join_keyword(kind, res)?;
    let to = if to.contains('.') {
        to.to_string()
    } else {
        format!("{table}.{to}")
    };
    Ok(format!(
        "{keyword} {} ON {} = {}",
        res.quote(table),
        res.quote(from),
        res.quote(&to)
    ))
}

/// Splits `table.column` into its parts.
fn split_target<'a>(target: &'a str, res: &Resolution<'_>) -> QuarryResult<(&'a str, &'a str)> {
    target
        .split_once('.')
        .ok_or_else(|| res.fail("target", &[("target", target)]))
}

fn join() -> ComponentDef {
    ComponentDef::new("join", 30)
        .on_string(|s, res| {
            let caps = JOIN_STRING
                .captures(s.trim())
                .ok_or_else(|| res.fail("string", &[]))?;
            let from = format!("{}.{}", &caps[1], &caps[2]);
            Ok(vec![render_join(&caps[3], &from, &caps[4], &caps[5], res)?])
        })
        .on_array(|items, res| {
            let parts: Vec<String> = items.iter().map(text_item).collect();
            let token = match parts.as_slice() {
                [from, target] => {
                    let (table, to) = split_target(target, res)?;
                    render_join("", from, table, to, res)?
                }
                [kind, from, target] => {
                    let (table, to) = split_target(target, res)?;
                    render_join(kind, from, table, to, res)?
                }
                [kind, from, table, to] => render_join(kind, from, table, to, res)?,
                _ => return Err(length_error(items, res)),
            };
            Ok(vec![token])
        })
        .on_object(|pairs, res| {
            let field = |name: &str| {
                pairs
                    .iter()
                    .find(|(k, _)| k == name)
                    .map(|(_, v)| text_item(v))
            };
            let from = field("from").ok_or_else(|| res.fail("object", &[("field", "from")]))?;
            let to = field("to").ok_or_else(|| res.fail("object", &[("field", "to")]))?;
            let kind = field("type").unwrap_or_default();
            let (table, to) = match field("table") {
                Some(table) => (table, to),
                None => {
                    let (table, column) = split_target(&to, res)?;
                    (table.to_string(), column.to_string())
                }
            };
            Ok(vec![render_join(&kind, &from, &table, &to, res)?])
        })
        .raw_verbatim()
        .message(
            "string",
            "Invalid join string specified for query builder \"{method}\" component. Expected \"table.column = table.column\": {arg}",
        )
        .message(
            "array",
            "Invalid array with {n} items specified for query builder \"{method}\" component. Expected [from, table.to], [type, from, table.to] or [type, from, table, to]: {arg}",
        )
        .message(
            "object",
            "Missing \"{field}\" in object for query builder \"{method}\" component: {arg}",
        )
        .message(
            "type",
            "Invalid join type \"{type}\" specified for query builder \"{method}\" component: {arg}",
        )
        .message(
            "target",
            "Invalid join target \"{target}\" specified for query builder \"{method}\" component. Expected table.column: {arg}",
        )
}

// ── Criteria ───────────────────────────────────────────────────────────

fn operator(value: &Value) -> Option<String> {
    let op = value.as_str()?.trim().to_ascii_uppercase();
    OPERATORS.contains(&op.as_str()).then_some(op)
}

/// Renders `column op value`, binding the value(s).
fn comparison(column: &str, op: &str, value: &Value, res: &mut Resolution<'_>) -> String {
    let column = res.quote(column);
    match (op, value) {
        ("=" | "IS", Value::Null) => format!("{column} IS NULL"),
        ("!=" | "<>" | "IS NOT", Value::Null) => format!("{column} IS NOT NULL"),
        // Empty lists are not valid SQL on every dialect.
        ("IN", Value::List(items)) if items.is_empty() => "1 = 0".to_string(),
        ("NOT IN", Value::List(items)) if items.is_empty() => "1 = 1".to_string(),
        ("IN" | "NOT IN", Value::List(items)) => {
            let markers: Vec<String> = items.iter().map(|v| res.bind(v.clone())).collect();
            format!("{column} {op} ({})", markers.join(", "))
        }
        _ => format!("{column} {op} {}", res.bind(value.clone())),
    }
}

fn criteria(name: &'static str, order: u8, keyword: &'static str) -> ComponentDef {
    ComponentDef::new(name, order)
        .keyword(keyword)
        .joiner(" AND ")
        .on_string(|s, res| {
            Ok(split_tokens(s)
                .iter()
                .map(|column| format!("{} = {}", res.quote(column), res.placeholder()))
                .collect())
        })
        .on_array(|items, res| match items {
            [column, value] => {
                let column = text_item(column);
                Ok(vec![match value {
                    // ["price", [">", 10]]
                    Value::List(pair) if pair.len() == 2 => match operator(&pair[0]) {
                        Some(op) => comparison(&column, &op, &pair[1], res),
                        None => comparison(&column, "IN", value, res),
                    },
                    Value::List(_) => comparison(&column, "IN", value, res),
                    _ => comparison(&column, "=", value, res),
                }])
            }
            [column, op, value] => {
                let op = operator(op).ok_or_else(|| {
                    let op = text_item(op);
                    res.fail("operator", &[("operator", op.as_str())])
                })?;
                Ok(vec![comparison(&text_item(column), &op, value, res)])
            }
            _ => Err(length_error(items, res)),
        })
        .on_object(|pairs, res| {
            let mut tokens = Vec::with_capacity(pairs.len());
            for (column, value) in pairs {
                let pair = BuilderArg::Array(vec![Value::from(column.as_str()), value.clone()]);
                tokens.extend(res.resolve_nested(&pair)?);
            }
            Ok(tokens)
        })
        .raw_verbatim()
        .message(
            "array",
            "Invalid array with {n} items specified for query builder \"{method}\" component. Expected [column, value] or [column, operator, value]: {arg}",
        )
        .message(
            "operator",
            "Invalid comparison operator \"{operator}\" specified for query builder \"{method}\" component: {arg}",
        )
}

// ── Tails ──────────────────────────────────────────────────────────────

fn group() -> ComponentDef {
    ComponentDef::new("group", 50)
        .keyword("GROUP BY")
        .joiner(", ")
        .on_string(|s, res| Ok(quote_all(s, res)))
        .on_array(|items, res| Ok(quote_values(items, res)))
        .raw_verbatim()
}

fn direction(dir: &str, res: &Resolution<'_>) -> QuarryResult<&'static str> {
    match dir.to_ascii_uppercase().as_str() {
        "ASC" => Ok("ASC"),
        "DESC" => Ok("DESC"),
        _ => Err(res.fail("direction", &[("direction", dir)])),
    }
}

fn order() -> ComponentDef {
    ComponentDef::new("order", 70)
        .keyword("ORDER BY")
        .joiner(", ")
        .on_string(|s, res| {
            // A trailing ASC/DESC attaches to the column before it.
            let mut tokens: Vec<String> = Vec::new();
            for token in split_tokens(s) {
                let upper = token.to_ascii_uppercase();
                if upper == "ASC" || upper == "DESC" {
                    let Some(last) = tokens.last_mut() else {
                        return Err(res.fail("direction", &[("direction", token.as_str())]));
                    };
                    last.push(' ');
                    last.push_str(&upper);
                } else {
                    tokens.push(res.quote(&token));
                }
            }
            Ok(tokens)
        })
        .on_array(|items, res| match items {
            [column, dir] => {
                let dir = direction(&text_item(dir), res)?;
                Ok(vec![format!("{} {dir}", res.quote(&text_item(column)))])
            }
            [column] => Ok(vec![res.quote(&text_item(column))]),
            _ => Err(length_error(items, res)),
        })
        .on_object(|pairs, res| {
            pairs
                .iter()
                .map(|(column, dir)| {
                    let dir = direction(&text_item(dir), res)?;
                    Ok(format!("{} {dir}", res.quote(column)))
                })
                .collect()
        })
        .raw_verbatim()
        .message(
            "array",
            "Invalid array with {n} items specified for query builder \"{method}\" component. Expected [column, direction]: {arg}",
        )
        .message(
            "direction",
            "Invalid sort direction \"{direction}\" specified for query builder \"{method}\" component: {arg}",
        )
}

fn counter(name: &'static str, order: u8, keyword: &'static str) -> ComponentDef {
    ComponentDef::new(name, order)
        .keyword(keyword)
        .replace_previous()
        .on_string(|s, res| {
            let n: u64 = s
                .trim()
                .parse()
                .map_err(|_| res.fail("number", &[]))?;
            Ok(vec![n.to_string()])
        })
        .raw_verbatim()
        .message(
            "number",
            "Invalid value specified for query builder \"{method}\" component. Expected a non-negative integer: {arg}",
        )
}

fn returning() -> ComponentDef {
    ComponentDef::new("returning", 90)
        .keyword("RETURNING")
        .joiner(", ")
        .on_string(|s, res| Ok(quote_all(s, res)))
        .raw_verbatim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::component::Slot;
    use crate::dialect::Dialect;

    fn def(name: &str) -> ComponentDef {
        builtin_components()
            .into_iter()
            .find(|d| d.method() == name)
            .unwrap()
    }

    fn tokens(name: &str, arg: BuilderArg) -> Vec<String> {
        def(name)
            .resolve(&arg, Dialect::SQLite)
            .unwrap()
            .tokens
            .into_iter()
            .map(|t| t.replace(crate::builder::component::BIND_MARKER, "?"))
            .collect()
    }

    #[test]
    fn test_builtin_list_matches_methods() {
        let names: Vec<String> = builtin_components()
            .iter()
            .map(|d| d.method().to_string())
            .collect();
        assert_eq!(names, BUILTIN_METHODS);
    }

    #[test]
    fn test_builtin_orders_ascend() {
        let orders: Vec<u8> = builtin_components().iter().map(ComponentDef::order).collect();
        let mut sorted = orders.clone();
        sorted.sort_unstable();
        assert_eq!(orders, sorted);
    }

    #[test]
    fn test_select_shapes() {
        assert_eq!(tokens("select", "id users.name *".into()), ["\"id\"", "\"users\".\"name\"", "*"]);
        assert_eq!(
            tokens("select", BuilderArg::array(["name", "n"])),
            ["\"name\" AS \"n\""]
        );
        assert_eq!(
            tokens("select", BuilderArg::object([("email", "address")])),
            ["\"email\" AS \"address\""]
        );
        assert_eq!(tokens("select", BuilderArg::raw("COUNT(*) AS n")), ["COUNT(*) AS n"]);
    }

    #[test]
    fn test_select_bad_array_names_method() {
        let err = def("select")
            .resolve(&BuilderArg::array(["a", "b", "c"]), Dialect::SQLite)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("3 items"));
        assert!(msg.contains("\"select\""));
        assert!(msg.contains("[a, b, c]"));
    }

    #[test]
    fn test_where_shapes() {
        assert_eq!(tokens("where", "a b".into()), ["\"a\" = ?", "\"b\" = ?"]);
        assert_eq!(tokens("where", BuilderArg::array(["a", "10"])), ["\"a\" = ?"]);
        assert_eq!(tokens("where", BuilderArg::array(["a", ">", "10"])), ["\"a\" > ?"]);
        assert_eq!(
            tokens("where", BuilderArg::object([("deleted", Value::Null)])),
            ["\"deleted\" IS NULL"]
        );
        assert_eq!(
            tokens(
                "where",
                BuilderArg::object([("id", Value::List(vec![Value::Int(1), Value::Int(2)]))])
            ),
            ["\"id\" IN (?, ?)"]
        );
        assert_eq!(
            tokens(
                "where",
                BuilderArg::object([("price", Value::List(vec![Value::from(">="), Value::Int(5)]))])
            ),
            ["\"price\" >= ?"]
        );
    }

    #[test]
    fn test_where_slots() {
        let out = def("where")
            .resolve(&"a".into(), Dialect::SQLite)
            .unwrap();
        assert_eq!(out.slots, [Slot::Open]);

        let out = def("where")
            .resolve(&BuilderArg::array(["a", "10"]), Dialect::SQLite)
            .unwrap();
        assert_eq!(out.slots, [Slot::Bound(Value::from("10"))]);
    }

    #[test]
    fn test_where_empty_list() {
        let out = def("where")
            .resolve(
                &BuilderArg::object([("id", Value::List(Vec::new()))]),
                Dialect::PostgreSQL,
            )
            .unwrap();
        assert_eq!(out.tokens, ["1 = 0"]);
        assert!(out.slots.is_empty());

        let negated = BuilderArg::Array(vec![
            Value::from("id"),
            Value::from("not in"),
            Value::List(Vec::new()),
        ]);
        assert_eq!(tokens("where", negated), ["1 = 1"]);
    }

    #[test]
    fn test_where_bad_operator() {
        let err = def("where")
            .resolve(&BuilderArg::array(["a", "~~", "10"]), Dialect::SQLite)
            .unwrap_err();
        assert!(err.to_string().contains("\"~~\""));
    }

    #[test]
    fn test_join_string() {
        assert_eq!(
            tokens("join", "users.id = orders.user_id".into()),
            ["JOIN \"orders\" ON \"users\".\"id\" = \"orders\".\"user_id\""]
        );
        assert_eq!(
            tokens("join", "users.id <= orders.user_id".into()),
            ["LEFT JOIN \"orders\" ON \"users\".\"id\" = \"orders\".\"user_id\""]
        );
        assert_eq!(
            tokens("join", "users.id<=>orders.user_id".into()),
            ["FULL JOIN \"orders\" ON \"users\".\"id\" = \"orders\".\"user_id\""]
        );
    }

    #[test]
    fn test_join_array_and_object() {
        assert_eq!(
            tokens("join", BuilderArg::array(["left", "users.id", "orders.user_id"])),
            ["LEFT JOIN \"orders\" ON \"users\".\"id\" = \"orders\".\"user_id\""]
        );
        assert_eq!(
            tokens(
                "join",
                BuilderArg::object([
                    ("type", "right"),
                    ("from", "users.id"),
                    ("table", "orders"),
                    ("to", "user_id"),
                ])
            ),
            ["RIGHT JOIN \"orders\" ON \"users\".\"id\" = \"orders\".\"user_id\""]
        );
    }

    #[test]
    fn test_join_bad_string() {
        let err = def("join")
            .resolve(&"users to orders".into(), Dialect::SQLite)
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid join string"));
    }

    #[test]
    fn test_order_directions() {
        assert_eq!(
            tokens("order", "surname DESC, forename".into()),
            ["\"surname\" DESC", "\"forename\""]
        );
        assert_eq!(tokens("order", BuilderArg::array(["name", "asc"])), ["\"name\" ASC"]);
        assert!(def("order")
            .resolve(&BuilderArg::array(["name", "sideways"]), Dialect::SQLite)
            .is_err());
    }

    #[test]
    fn test_limit_requires_number() {
        assert_eq!(tokens("limit", "10".into()), ["10"]);
        let err = def("limit").resolve(&"ten".into(), Dialect::SQLite).unwrap_err();
        assert!(err.to_string().contains("non-negative integer"));
    }

    #[test]
    fn test_values_and_set() {
        assert_eq!(tokens("values", BuilderArg::array([1, 2])), ["?", "?"]);
        assert_eq!(tokens("values", "a b c".into()), ["?", "?", "?"]);
        assert_eq!(
            tokens("set", BuilderArg::object([("name", "x"), ("email", "y")])),
            ["\"name\" = ?", "\"email\" = ?"]
        );
    }

    #[test]
    fn test_object_rejected_where_unsupported() {
        let err = def("values")
            .resolve(&BuilderArg::object([("a", 1)]), Dialect::SQLite)
            .unwrap_err();
        assert_eq!(err.kind(), quarry_core::ErrorKind::Invocation);
        assert!(err.to_string().contains("Invalid object argument"));
    }
}
