//! Geometry extraction from the capture's property list.
//!
//! The capture tooling records the NAND geometry in a plist next to the
//! dump. The five integers may sit at the top level or inside a nested
//! `<dict>`, and some captures store them as `<string>`s rather than
//! `<integer>`s, so lookup recurses and accepts either representation.

use std::path::Path;

use plist::{Dictionary, Value};

use super::DumpGeometry;
use crate::error::{Error, Result};

const PAGE_BYTES_KEY: &str = "#page-bytes";
const META_PER_LOGICAL_PAGE_KEY: &str = "meta-per-logical-page";
const BLOCK_PAGES_KEY: &str = "#block-pages";
const CE_BLOCKS_KEY: &str = "#ce-blocks";
const CE_KEY: &str = "#ce";

/// Load the dump geometry from a plist file.
pub fn load_geometry<P: AsRef<Path>>(path: P) -> Result<DumpGeometry> {
    geometry_from_value(Value::from_file(path)?)
}

fn geometry_from_value(root: Value) -> Result<DumpGeometry> {
    let root = root.into_dictionary().ok_or(Error::NoRootDict)?;

    Ok(DumpGeometry {
        page_bytes: find_integer(&root, PAGE_BYTES_KEY)?,
        meta_per_logical_page: find_integer(&root, META_PER_LOGICAL_PAGE_KEY)?,
        block_pages: find_integer(&root, BLOCK_PAGES_KEY)?,
        ce_blocks: find_integer(&root, CE_BLOCKS_KEY)?,
        ce: find_integer(&root, CE_KEY)?,
    })
}

/// Depth-first search for `key`, here or in any nested dictionary.
fn find_key<'a>(dict: &'a Dictionary, key: &str) -> Option<&'a Value> {
    if let Some(value) = dict.get(key) {
        return Some(value);
    }

    dict.values()
        .filter_map(Value::as_dictionary)
        .find_map(|nested| find_key(nested, key))
}

fn find_integer(dict: &Dictionary, key: &'static str) -> Result<u64> {
    let value = find_key(dict, key).ok_or(Error::MissingPlistKey { key })?;

    let parsed = match value {
        Value::Integer(n) => n.as_unsigned(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };

    parsed.ok_or(Error::BadPlistValue { key })
}

#[cfg(test)]
fn test_plist(nested: bool) -> Value {
    let mut geometry = Dictionary::new();
    geometry.insert(PAGE_BYTES_KEY.into(), Value::Integer(8192u64.into()));
    // A numeric string must parse the same as an integer.
    geometry.insert(
        META_PER_LOGICAL_PAGE_KEY.into(),
        Value::String("12".into()),
    );
    geometry.insert(BLOCK_PAGES_KEY.into(), Value::Integer(2u64.into()));
    geometry.insert(CE_BLOCKS_KEY.into(), Value::Integer(1u64.into()));
    geometry.insert(CE_KEY.into(), Value::Integer(2u64.into()));

    if nested {
        let mut root = Dictionary::new();
        root.insert("device-id".into(), Value::String("n88ap".into()));
        root.insert("nand-info".into(), Value::Dictionary(geometry));
        Value::Dictionary(root)
    } else {
        Value::Dictionary(geometry)
    }
}

#[test]
fn test_geometry_from_plist() {
    let expected = DumpGeometry {
        page_bytes: 8192,
        meta_per_logical_page: 12,
        block_pages: 2,
        ce_blocks: 1,
        ce: 2,
    };

    assert_eq!(geometry_from_value(test_plist(false)).unwrap(), expected);
    assert_eq!(geometry_from_value(test_plist(true)).unwrap(), expected);
}

#[test]
fn test_missing_and_malformed_keys() {
    let mut dict = test_plist(false).into_dictionary().unwrap();
    dict.remove(CE_KEY);
    assert!(matches!(
        geometry_from_value(Value::Dictionary(dict.clone())),
        Err(Error::MissingPlistKey { key: CE_KEY })
    ));

    dict.insert(CE_KEY.into(), Value::String("two".into()));
    assert!(matches!(
        geometry_from_value(Value::Dictionary(dict)),
        Err(Error::BadPlistValue { key: CE_KEY })
    ));

    assert!(matches!(
        geometry_from_value(Value::String("not a dict".into())),
        Err(Error::NoRootDict)
    ));
}
