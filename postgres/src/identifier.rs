use pg_escape::quote_identifier;

/// Quotes a possibly schema-qualified table or column name.
///
/// `public.information_list` becomes `public.information_list` while names that need quoting,
/// such as `Weird Name`, are wrapped in double quotes part by part.
pub fn quote_qualified_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| quote_identifier(part).into_owned())
        .collect::<Vec<_>>()
        .join(".")
}
