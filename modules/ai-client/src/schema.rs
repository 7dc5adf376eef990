use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

/// Trait for types that can be used as Gemini structured output.
///
/// Automatically implemented for any type that implements `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Generate a Gemini-compatible response schema for this type.
    ///
    /// Gemini accepts an OpenAPI 3.0 subset:
    /// 1. Fully inlined schemas (no `$ref` references)
    /// 2. Optional fields expressed as `nullable: true`, never `["T", "null"]`
    ///    type arrays or `anyOf` with a null branch
    /// 3. No `additionalProperties`, and only a short list of `format` values
    fn response_schema() -> serde_json::Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        inline_refs(&mut value);
        fix_nullable(&mut value);
        strip_unsupported(&mut value);

        if let serde_json::Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$defs");
            map.remove("$schema");
        }

        value
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

/// `format` values Gemini understands; schemars emits others (`uint32`, ...)
/// that the API rejects outright.
const SUPPORTED_FORMATS: [&str; 5] = ["int32", "int64", "float", "double", "date-time"];

fn inline_refs(value: &mut serde_json::Value) {
    let definitions = if let serde_json::Value::Object(map) = value {
        map.get("definitions")
            .or_else(|| map.get("$defs"))
            .cloned()
    } else {
        None
    };

    if let Some(defs) = definitions {
        inline_refs_recursive(value, &defs);
    }
}

fn inline_refs_recursive(value: &mut serde_json::Value, definitions: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(ref_path)) = map.get("$ref").cloned() {
                let type_name = ref_path
                    .strip_prefix("#/definitions/")
                    .or_else(|| ref_path.strip_prefix("#/$defs/"));
                if let Some(def) = type_name.and_then(|n| definitions.get(n)) {
                    *value = def.clone();
                    inline_refs_recursive(value, definitions);
                    return;
                }
            }

            // schemars wraps single-ref fields in allOf; unwrap those.
            if let Some(serde_json::Value::Array(all_of)) = map.get("allOf").cloned() {
                if all_of.len() == 1 {
                    let inner = all_of.into_iter().next().unwrap_or_default();
                    map.remove("allOf");
                    if let serde_json::Value::Object(inner_map) = inner {
                        for (k, v) in inner_map {
                            map.entry(k).or_insert(v);
                        }
                    }
                    inline_refs_recursive(value, definitions);
                    return;
                }
            }

            for (_, v) in map.iter_mut() {
                inline_refs_recursive(v, definitions);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                inline_refs_recursive(item, definitions);
            }
        }
        _ => {}
    }
}

fn fix_nullable(value: &mut serde_json::Value) {
    if let serde_json::Value::Object(map) = value {
        // type: ["T", "null"] → type: "T" + nullable: true
        if let Some(serde_json::Value::Array(types)) = map.get("type").cloned() {
            if types.iter().any(|t| t == "null") {
                if let Some(concrete) = types.iter().find(|t| *t != "null").cloned() {
                    map.insert("type".to_string(), concrete);
                    map.insert("nullable".to_string(), serde_json::Value::Bool(true));
                }
            }
        }

        // anyOf: [T, {type: null}] → T + nullable: true
        if let Some(serde_json::Value::Array(branches)) = map.get("anyOf").cloned() {
            let null_branch = serde_json::json!({"type": "null"});
            if branches.len() == 2 && branches.contains(&null_branch) {
                if let Some(serde_json::Value::Object(mut concrete)) =
                    branches.into_iter().find(|b| *b != null_branch)
                {
                    map.remove("anyOf");
                    for (k, v) in map.iter() {
                        concrete.entry(k.clone()).or_insert_with(|| v.clone());
                    }
                    concrete.insert("nullable".to_string(), serde_json::Value::Bool(true));
                    *map = concrete;
                }
            }
        }

        for (_, v) in map.iter_mut() {
            fix_nullable(v);
        }
    } else if let serde_json::Value::Array(arr) = value {
        for item in arr.iter_mut() {
            fix_nullable(item);
        }
    }
}

fn strip_unsupported(value: &mut serde_json::Value) {
    if let serde_json::Value::Object(map) = value {
        map.remove("additionalProperties");

        let drop_format = matches!(
            map.get("format"),
            Some(serde_json::Value::String(f)) if !SUPPORTED_FORMATS.contains(&f.as_str())
        );
        if drop_format {
            map.remove("format");
        }

        for (_, v) in map.iter_mut() {
            strip_unsupported(v);
        }
    } else if let serde_json::Value::Array(arr) = value {
        for item in arr.iter_mut() {
            strip_unsupported(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct TestVerdict {
        title: String,
        caption: Option<String>,
    }

    #[derive(Deserialize, JsonSchema)]
    struct TestResponse {
        verdicts: Vec<TestVerdict>,
    }

    #[test]
    fn test_response_schema_generation() {
        let schema = TestResponse::response_schema();
        assert!(schema.is_object());
    }

    #[test]
    fn test_optional_field_nullable() {
        let schema = TestVerdict::response_schema();
        let caption = &schema["properties"]["caption"];

        assert_eq!(caption["type"], serde_json::json!("string"));
        assert_eq!(caption["nullable"], serde_json::json!(true));
    }

    #[test]
    fn test_no_additional_properties() {
        let schema = TestResponse::response_schema();
        let schema_str = serde_json::to_string(&schema).unwrap();
        assert!(!schema_str.contains("additionalProperties"));
    }

    #[test]
    fn test_unsigned_formats_stripped() {
        #[derive(Deserialize, JsonSchema)]
        struct Sized {
            count: u32,
        }

        let schema = Sized::response_schema();
        let count = schema["properties"]["count"].as_object().unwrap();
        assert_eq!(count.get("type"), Some(&serde_json::json!("integer")));
        assert!(!count.contains_key("format"));
    }

    #[test]
    fn test_nested_struct_inlined() {
        let schema = TestResponse::response_schema();
        let schema_obj = schema.as_object().unwrap();

        assert!(!schema_obj.contains_key("definitions"));
        assert!(!schema_obj.contains_key("$schema"));

        let items = &schema["properties"]["verdicts"]["items"];
        let items_obj = items.as_object().unwrap();
        assert!(!items_obj.contains_key("$ref"));
        assert_eq!(items_obj.get("type"), Some(&serde_json::json!("object")));
    }

    #[test]
    fn test_enum_field_inlined() {
        #[derive(Deserialize, JsonSchema)]
        #[serde(rename_all = "snake_case")]
        #[allow(dead_code)]
        enum Slot {
            Infobox,
            Inline,
            Gallery,
        }

        #[derive(Deserialize, JsonSchema)]
        struct Pick {
            slot: Slot,
        }

        let schema = Pick::response_schema();
        let slot = &schema["properties"]["slot"];
        let values = slot["enum"].as_array().expect("enum values inlined");
        assert!(values.contains(&serde_json::json!("infobox")));
    }
}
