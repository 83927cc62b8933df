// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android artifacts: `res/xml/app_restrictions.xml`, the string resources it
// references, and the `AndroidManifest.xml` entries that publish it.
//
// The documents are small and fully under our control, so they are written
// and read back with plain string handling rather than a DOM.

use std::collections::BTreeMap;

use mdmkit_core::error::{MdmError, Result};
use mdmkit_core::{ConfigValue, RestrictionMap, RestrictionSpec, RestrictionType};

use crate::validate::DESCRIPTION_SUFFIX;

const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";

/// `<meta-data>` name the system looks up to find the restriction schema.
pub const APP_RESTRICTIONS_META: &str = "android.content.APP_RESTRICTIONS";

/// Resource reference of the generated schema.
pub const APP_RESTRICTIONS_RESOURCE: &str = "@xml/app_restrictions";

/// Prefix of every generated string resource name, keeping them clear of the
/// app's own strings (`app_name` and friends).
pub const STRING_RESOURCE_PREFIX: &str = "mdm_";

const XML_PROLOG: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

/// `android:restrictionType` value for a declared type.
pub fn restriction_type_name(kind: RestrictionType) -> &'static str {
    match kind {
        RestrictionType::String => "string",
        RestrictionType::Bool => "bool",
        RestrictionType::Number => "integer",
    }
}

fn restriction_type_from_name(name: &str) -> Option<RestrictionType> {
    match name {
        "string" => Some(RestrictionType::String),
        "bool" => Some(RestrictionType::Bool),
        "integer" => Some(RestrictionType::Number),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Emitters
// ---------------------------------------------------------------------------

/// Build `app_restrictions.xml`. Titles and descriptions point at string
/// resources named after the key (`@string/mdm_{key}`,
/// `@string/mdm_{key}Description`).
pub fn build_restrictions_xml(map: &RestrictionMap) -> String {
    let mut xml = String::from(XML_PROLOG);
    xml.push_str(&format!("<restrictions xmlns:android=\"{ANDROID_NS}\">\n"));

    for (key, spec) in map {
        xml.push_str("    <restriction\n");
        push_attribute(&mut xml, "android:key", key);
        push_attribute(&mut xml, "android:title", &format!("@string/{}", title_name(key)));
        push_attribute(
            &mut xml,
            "android:restrictionType",
            restriction_type_name(spec.kind),
        );
        if let Some(default) = &spec.default_value {
            push_attribute(&mut xml, "android:defaultValue", &default.to_string());
        }
        if spec.description.is_some() {
            push_attribute(
                &mut xml,
                "android:description",
                &format!("@string/{}", description_name(key)),
            );
        }
        xml.push_str("        />\n");
    }

    xml.push_str("</restrictions>\n");
    xml
}

/// String resource holding the title of restriction `key`.
pub fn title_name(key: &str) -> String {
    format!("{STRING_RESOURCE_PREFIX}{key}")
}

/// String resource holding the description of restriction `key`.
pub fn description_name(key: &str) -> String {
    format!("{STRING_RESOURCE_PREFIX}{key}{DESCRIPTION_SUFFIX}")
}

fn push_attribute(xml: &mut String, name: &str, value: &str) {
    xml.push_str(&format!("        {name}=\"{}\"\n", escape_attribute(value)));
}

/// Build the string resources holding each restriction's title and
/// description.
pub fn build_strings_xml(map: &RestrictionMap) -> String {
    let mut xml = String::from(XML_PROLOG);
    xml.push_str("<resources>\n");

    for (key, spec) in map {
        push_string(&mut xml, &title_name(key), &spec.title);
        if let Some(description) = &spec.description {
            push_string(&mut xml, &description_name(key), description);
        }
    }

    xml.push_str("</resources>\n");
    xml
}

fn push_string(xml: &mut String, name: &str, text: &str) {
    xml.push_str(&format!(
        "    <string name=\"{}\">{}</string>\n",
        escape_attribute(name),
        escape_resource_text(text)
    ));
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// Read back a string resource file as name → text.
pub fn parse_strings_xml(xml: &str) -> Result<BTreeMap<String, String>> {
    let mut strings = BTreeMap::new();
    let mut rest = xml;

    while let Some(start) = rest.find("<string ") {
        let after = &rest[start + "<string ".len()..];
        let tag_end = after
            .find('>')
            .ok_or_else(|| malformed("unterminated <string> element"))?;
        let head = &after[..tag_end];

        let (head, text, remainder) = if let Some(head) = head.strip_suffix('/') {
            (head, String::new(), &after[tag_end + 1..])
        } else {
            let body = &after[tag_end + 1..];
            let close = body
                .find("</string>")
                .ok_or_else(|| malformed("missing </string>"))?;
            (
                head,
                unescape_resource_text(&body[..close]),
                &body[close + "</string>".len()..],
            )
        };

        let attributes = parse_attributes(head)?;
        let name = attributes
            .get("name")
            .ok_or_else(|| malformed("<string> without a name"))?;
        strings.insert(name.clone(), text);
        rest = remainder;
    }

    Ok(strings)
}

/// Read back `app_restrictions.xml`, resolving `@string/` references against
/// `strings` (as returned by [`parse_strings_xml`]).
pub fn parse_restrictions_xml(
    xml: &str,
    strings: &BTreeMap<String, String>,
) -> Result<RestrictionMap> {
    let mut map = RestrictionMap::new();
    let mut rest = xml;

    while let Some(start) = rest.find("<restriction") {
        let after = &rest[start + "<restriction".len()..];
        // `<restrictions>` root (or a nested bundle list) carries no entry.
        if !after.starts_with(char::is_whitespace) {
            rest = after;
            continue;
        }
        let end = after
            .find("/>")
            .ok_or_else(|| malformed("unterminated <restriction> element"))?;
        let attributes = parse_attributes(&after[..end])?;
        rest = &after[end + 2..];

        let key = required(&attributes, "android:key")?.to_owned();
        let type_name = required(&attributes, "android:restrictionType")?;
        let kind = restriction_type_from_name(type_name)
            .ok_or_else(|| malformed(&format!("unsupported restrictionType '{type_name}'")))?;

        let title = resolve(required(&attributes, "android:title")?, strings)?;
        let description = attributes
            .get("android:description")
            .map(|d| resolve(d, strings))
            .transpose()?;
        let default_value = attributes
            .get("android:defaultValue")
            .map(|raw| parse_default(&key, kind, raw))
            .transpose()?;

        map.insert(
            key,
            RestrictionSpec {
                title,
                kind,
                default_value,
                description,
            },
        );
    }

    Ok(map)
}

fn required<'a>(attributes: &'a BTreeMap<String, String>, name: &str) -> Result<&'a str> {
    attributes
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| malformed(&format!("<restriction> missing {name}")))
}

fn resolve(value: &str, strings: &BTreeMap<String, String>) -> Result<String> {
    match value.strip_prefix("@string/") {
        Some(name) => strings
            .get(name)
            .cloned()
            .ok_or_else(|| malformed(&format!("string resource '{name}' is not defined"))),
        None => Ok(value.to_owned()),
    }
}

fn parse_default(key: &str, kind: RestrictionType, raw: &str) -> Result<ConfigValue> {
    match kind {
        RestrictionType::String => Ok(ConfigValue::String(raw.to_owned())),
        RestrictionType::Bool => raw
            .parse::<bool>()
            .map(ConfigValue::Bool)
            .map_err(|_| malformed(&format!("default for '{key}' is not a boolean: {raw}"))),
        RestrictionType::Number => raw
            .parse::<i64>()
            .map(ConfigValue::from)
            .map_err(|_| malformed(&format!("default for '{key}' is not an integer: {raw}"))),
    }
}

/// Parse `name="value"` pairs from the inside of a start tag.
fn parse_attributes(mut source: &str) -> Result<BTreeMap<String, String>> {
    let mut attributes = BTreeMap::new();
    loop {
        source = source.trim_start();
        if source.is_empty() {
            return Ok(attributes);
        }
        let eq = source
            .find('=')
            .ok_or_else(|| malformed("attribute without a value"))?;
        let name = source[..eq].trim();
        let value_part = source[eq + 1..].trim_start();
        let quote = value_part
            .chars()
            .next()
            .filter(|c| *c == '"' || *c == '\'')
            .ok_or_else(|| malformed(&format!("attribute {name} is not quoted")))?;
        let close = value_part[1..]
            .find(quote)
            .ok_or_else(|| malformed(&format!("attribute {name} is not terminated")))?;
        attributes.insert(name.to_owned(), unescape_xml(&value_part[1..=close]));
        source = &value_part[close + 2..];
    }
}

fn malformed(detail: &str) -> MdmError {
    MdmError::Schema(format!("malformed Android resource: {detail}"))
}

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// aapt treats `\`, `'` and `"` specially in string resources, and a leading
/// `@` or `?` as a reference.
fn escape_resource_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    if text.starts_with(['@', '?']) {
        escaped.push('\\');
    }
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn unescape_resource_text(text: &str) -> String {
    let text = unescape_xml(text);
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Add the restriction-schema `<meta-data>` entry and `<queries>` packages to
/// an `AndroidManifest.xml`. Entries already present are left alone, so
/// applying the patch twice yields the same document.
pub fn patch_manifest(
    manifest: &str,
    add_restrictions_meta: bool,
    query_packages: &[String],
) -> Result<String> {
    let mut out = manifest.to_owned();

    if add_restrictions_meta && !out.contains(APP_RESTRICTIONS_META) {
        let close = application_close(&mut out)?;
        let entry = format!(
            "        <meta-data android:name=\"{APP_RESTRICTIONS_META}\" android:resource=\"{APP_RESTRICTIONS_RESOURCE}\"/>\n"
        );
        insert_block(&mut out, close, &entry);
    }

    let mut missing: Vec<String> = Vec::new();
    for package in query_packages {
        let element = format!("<package android:name=\"{}\"", escape_attribute(package));
        if !out.contains(&element) && !missing.contains(&element) {
            missing.push(element);
        }
    }
    if missing.is_empty() {
        return Ok(out);
    }

    let entries: String = missing
        .iter()
        .map(|element| format!("        {element}/>\n"))
        .collect();

    if let Some(close) = out.find("</queries>") {
        insert_block(&mut out, close, &entries);
    } else {
        let anchor = find_start_tag(&out, "application")
            .or_else(|| out.find("</manifest>"))
            .ok_or_else(|| malformed("AndroidManifest.xml has no <manifest> element"))?;
        let block = format!("    <queries>\n{entries}    </queries>\n");
        insert_block(&mut out, anchor, &block);
    }

    Ok(out)
}

/// Offset of `</application>`. A self-closing `<application .../>` is opened
/// up first so children can be added.
fn application_close(out: &mut String) -> Result<usize> {
    if let Some(close) = out.find("</application>") {
        return Ok(close);
    }
    let open = find_start_tag(out, "application")
        .ok_or_else(|| malformed("AndroidManifest.xml has no <application> element"))?;
    let tag_end = out[open..]
        .find('>')
        .map(|i| open + i)
        .ok_or_else(|| malformed("unterminated <application> element"))?;
    if !out[..tag_end].ends_with('/') {
        return Err(malformed("<application> element is never closed"));
    }
    out.replace_range(tag_end - 1..=tag_end, "></application>");
    Ok(tag_end)
}

/// Offset of the first `<{name}` start tag (not a longer tag name sharing
/// the prefix).
fn find_start_tag(text: &str, name: &str) -> Option<usize> {
    let needle = format!("<{name}");
    let mut from = 0;
    while let Some(found) = text[from..].find(&needle) {
        let start = from + found;
        let after = &text[start + needle.len()..];
        if after.starts_with(|c: char| c.is_whitespace() || c == '>' || c == '/') {
            return Some(start);
        }
        from = start + needle.len();
    }
    None
}

/// Insert an indented, newline-terminated block before `index`. When the
/// target line holds other markup before `index` (minified manifests), the
/// block goes in inline so it stays inside the enclosing element.
fn insert_block(out: &mut String, index: usize, block: &str) {
    let line_start = out[..index].rfind('\n').map_or(0, |i| i + 1);
    if out[line_start..index].trim().is_empty() {
        out.insert_str(line_start, block);
    } else {
        let inline: String = block.lines().map(str::trim).collect();
        out.insert_str(index, &inline);
    }
}
