use regex::Regex;

use crate::value::{NamedParams, Param, PositionalParams, Value};

/// A named reference: a colon followed by the longest run of identifier characters.
const NAMED_PLACEHOLDER: &str = r":([A-Za-z0-9_-]+)";

/// An SQL statement using only positional (`?`) placeholders, together with
/// the values to bind to them in order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedStatement {
    pub sql: String,
    pub parameters: Vec<Value>,
}

/// One parameter reference found in a template.
#[derive(Debug)]
struct Placement<'a> {
    position: usize,
    /// Length of the replaced text (`:name` or `?`)
    len: usize,
    param: &'a Param,
}

/// Rewrites named placeholders (`:name`) into positional ones (`?`).
///
/// A reference only matches a declared name when followed by end of input or
/// a character outside `[A-Za-z0-9_-]`, so `:key` never matches inside
/// `:keyword`. List parameters expand into one placeholder per element.
/// Declared names that never appear are ignored; references to undeclared
/// names are left in the SQL untouched.
///
/// # Examples
///
/// ```
/// use sqlx_txman::{builder::expand, NamedParams, Value};
///
/// let params = NamedParams::new()
///     .put("value", "abc")
///     .put_list("keys", [123, 456]);
/// let expanded = expand("SELECT * FROM record WHERE key IN (:keys) AND value = :value", &params)?;
/// assert_eq!(expanded.sql, "SELECT * FROM record WHERE key IN (?, ?) AND value = ?");
/// assert_eq!(
///     expanded.parameters,
///     vec![Value::Int(123), Value::Int(456), Value::Text("abc".into())]
/// );
/// # Ok::<(), sqlx_txman::Error>(())
/// ```
pub fn expand(template: &str, params: &NamedParams) -> crate::Result<ExpandedStatement> {
    let regex = Regex::new(NAMED_PLACEHOLDER)?;
    let placements = regex
        .captures_iter(template)
        .filter_map(|caps| {
            let reference = caps.get(0)?;
            let param = params.get(caps.get(1)?.as_str())?;
            Some(Placement {
                position: reference.start(),
                len: reference.len(),
                param,
            })
        })
        .collect();
    Ok(rewrite(template, placements, &[]))
}

/// Aligns `params` with the `?` placeholders of `template`, widening the
/// placeholder of every list parameter to one `?` per element.
///
/// Parameters beyond the last placeholder are appended unchanged and
/// placeholders beyond the last parameter are left as they are; the database
/// reports the mismatch.
pub fn expand_positional(
    template: &str,
    params: &PositionalParams,
) -> crate::Result<ExpandedStatement> {
    let params = params.as_slice();
    let placements: Vec<_> = template
        .match_indices('?')
        .zip(params)
        .map(|((position, _), param)| Placement {
            position,
            len: 1,
            param,
        })
        .collect();
    let surplus = &params[placements.len()..];
    Ok(rewrite(template, placements, surplus))
}

fn rewrite(
    template: &str,
    mut placements: Vec<Placement<'_>>,
    surplus: &[Param],
) -> ExpandedStatement {
    placements.sort_by_key(|placement| placement.position);

    let (sql, parameters, _) = placements.into_iter().fold(
        (template.to_owned(), Vec::new(), 0isize),
        |(mut sql, mut parameters, delta), placement| {
            let replacement = placement.param.placeholders();
            let start = placement.position.saturating_add_signed(delta);
            sql.replace_range(start..start + placement.len, &replacement);
            parameters.extend_from_slice(placement.param.values());
            let delta = delta + replacement.len() as isize - placement.len as isize;
            (sql, parameters, delta)
        },
    );

    let parameters = surplus.iter().fold(parameters, |mut parameters, param| {
        parameters.extend_from_slice(param.values());
        parameters
    });

    ExpandedStatement { sql, parameters }
}
