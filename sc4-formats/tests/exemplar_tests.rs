//! Integration tests for the Exemplar/Cohort decoder

use sc4_formats::exemplar::{self, Value, ValueType};
use sc4_formats::{Error, Tgi};

fn build_exemplar(properties: &[Vec<u8>]) -> Vec<u8> {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(b"EQZB1###");
    buffer.extend_from_slice(&0u32.to_le_bytes()); // parent type
    buffer.extend_from_slice(&0u32.to_le_bytes()); // parent group
    buffer.extend_from_slice(&0u32.to_le_bytes()); // parent instance
    buffer.extend_from_slice(&(properties.len() as u32).to_le_bytes());
    for property in properties {
        buffer.extend_from_slice(property);
    }
    buffer
}

fn uint32_property(id: u32, value: u32) -> Vec<u8> {
    let mut prop = Vec::new();
    prop.extend_from_slice(&id.to_le_bytes());
    prop.extend_from_slice(&0x0300u16.to_le_bytes());
    prop.extend_from_slice(&0x0000u16.to_le_bytes());
    prop.push(0); // reps byte
    prop.extend_from_slice(&value.to_le_bytes());
    prop
}

fn float_list_property(id: u32, values: &[f32]) -> Vec<u8> {
    let mut prop = Vec::new();
    prop.extend_from_slice(&id.to_le_bytes());
    prop.extend_from_slice(&0x0900u16.to_le_bytes());
    prop.extend_from_slice(&0x0080u16.to_le_bytes());
    prop.push(0); // unused flag
    prop.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for value in values {
        prop.extend_from_slice(&value.to_le_bytes());
    }
    prop
}

fn string_property(id: u32, value: &str) -> Vec<u8> {
    let mut prop = Vec::new();
    prop.extend_from_slice(&id.to_le_bytes());
    prop.extend_from_slice(&0x0C00u16.to_le_bytes());
    prop.extend_from_slice(&0x0000u16.to_le_bytes());
    prop.push(value.len() as u8);
    prop.extend_from_slice(value.as_bytes());
    prop
}

fn bool_property(id: u32, value: bool) -> Vec<u8> {
    let mut prop = Vec::new();
    prop.extend_from_slice(&id.to_le_bytes());
    prop.extend_from_slice(&0x0B00u16.to_le_bytes());
    prop.extend_from_slice(&0x0000u16.to_le_bytes());
    prop.push(0); // reps flag, unused for bool
    prop.push(u8::from(value));
    prop
}

fn string_array_property(id: u32, values: &[&str]) -> Vec<u8> {
    let mut table = Vec::new();
    let mut blob = Vec::new();
    for value in values {
        table.extend_from_slice(&(value.len() as u32).to_le_bytes());
        blob.extend_from_slice(value.as_bytes());
    }
    let total = table.len() + blob.len();

    let mut prop = Vec::new();
    prop.extend_from_slice(&id.to_le_bytes());
    prop.extend_from_slice(&0x0C00u16.to_le_bytes());
    prop.extend_from_slice(&0x0081u16.to_le_bytes());
    prop.push(0);
    prop.extend_from_slice(&(total as u32).to_le_bytes());
    prop.extend_from_slice(&(values.len() as u32).to_le_bytes());
    prop.extend_from_slice(&table);
    prop.extend_from_slice(&blob);
    prop
}

#[test]
fn test_binary_mixed_properties() {
    let buffer = build_exemplar(&[
        uint32_property(0x12345678, 0xCAFEBABE),
        float_list_property(0x87654321, &[1.0, 2.5]),
        string_property(0x0000DEAD, "Test"),
    ]);
    let record = exemplar::parse(&buffer).unwrap();
    assert!(!record.is_cohort);
    assert!(!record.is_text);
    assert_eq!(record.properties.len(), 3);

    let uint_prop = record.find_property(0x12345678).unwrap();
    assert!(!uint_prop.is_list);
    assert_eq!(uint_prop.values, vec![Value::Uint32(0xCAFEBABE)]);

    let float_prop = record.find_property(0x87654321).unwrap();
    assert!(float_prop.is_list);
    assert_eq!(
        float_prop.values,
        vec![Value::Float32(1.0), Value::Float32(2.5)]
    );

    let string_prop = record.find_property(0x0000DEAD).unwrap();
    assert!(!string_prop.is_list);
    assert_eq!(string_prop.values, vec![Value::String("Test".to_string())]);
}

#[test]
fn test_binary_parent_key_and_cohort_marker() {
    let mut buffer = build_exemplar(&[]);
    buffer[0] = b'C';
    buffer[8..12].copy_from_slice(&0x05342861u32.to_le_bytes());
    buffer[12..16].copy_from_slice(&0x11111111u32.to_le_bytes());
    buffer[16..20].copy_from_slice(&0x22222222u32.to_le_bytes());
    let record = exemplar::parse(&buffer).unwrap();
    assert!(record.is_cohort);
    assert_eq!(record.parent, Tgi::new(0x05342861, 0x11111111, 0x22222222));
}

#[test]
fn test_binary_bool_and_scalar_queries() {
    let buffer = build_exemplar(&[
        bool_property(0x10, true),
        bool_property(0x11, false),
        uint32_property(0x12, 7),
    ]);
    let record = exemplar::parse(&buffer).unwrap();
    assert_eq!(record.get_scalar::<bool>(0x10), Some(true));
    assert_eq!(record.get_scalar::<bool>(0x11), Some(false));
    assert_eq!(record.get_scalar::<u32>(0x12), Some(7));
    // Exact-type lookup refuses a mismatched tag.
    assert_eq!(record.get_scalar::<u16>(0x12), None);
    // The widening lookup converts across integer types.
    assert_eq!(record.get_scalar_as::<u16>(0x12, 0), Some(7));
    assert_eq!(record.get_scalar_as::<i64>(0x12, 0), Some(7));
    // But never across the numeric/bool boundary.
    assert_eq!(record.get_scalar_as::<u32>(0x10, 0), None);
}

#[test]
fn test_binary_string_array() {
    let buffer = build_exemplar(&[string_array_property(0x42, &["one", "two", "three"])]);
    let record = exemplar::parse(&buffer).unwrap();
    let prop = record.find_property(0x42).unwrap();
    assert!(prop.is_list);
    assert_eq!(
        prop.values,
        vec![
            Value::String("one".to_string()),
            Value::String("two".to_string()),
            Value::String("three".to_string()),
        ]
    );
}

#[test]
fn test_binary_rejects_unknown_value_type() {
    let mut prop = Vec::new();
    prop.extend_from_slice(&0x1u32.to_le_bytes());
    prop.extend_from_slice(&0x0400u16.to_le_bytes()); // not a known tag
    prop.extend_from_slice(&0x0000u16.to_le_bytes());
    prop.push(0);
    let buffer = build_exemplar(&[prop]);
    assert!(matches!(
        exemplar::parse(&buffer),
        Err(Error::UnknownValueType(0x0400))
    ));
}

#[test]
fn test_binary_rejects_truncated_property() {
    let mut buffer = build_exemplar(&[uint32_property(0x1, 0x2)]);
    buffer.truncate(buffer.len() - 2);
    assert!(matches!(
        exemplar::parse(&buffer),
        Err(Error::Underrun { .. })
    ));
}

#[test]
fn test_rejects_bad_signature() {
    let mut buffer = build_exemplar(&[]);
    buffer[3] = b'X';
    assert!(matches!(
        exemplar::parse(&buffer),
        Err(Error::BadExemplarSignature(_))
    ));
}

#[test]
fn test_duplicate_ids_preserve_parse_order() {
    let buffer = build_exemplar(&[
        uint32_property(0x99, 1),
        uint32_property(0x99, 2),
    ]);
    let record = exemplar::parse(&buffer).unwrap();
    assert_eq!(record.find_property(0x99).unwrap().values, vec![Value::Uint32(1)]);
    let all = record.find_properties(0x99);
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].values, vec![Value::Uint32(2)]);
}

#[test]
fn test_text_exemplar_scalars_and_lists() {
    let text = "EQZT1###\n\
        ParentCohort=Key:{0x00000000,0x00000000,0x00000000}\n\
        PropCount=0x00000004\n\
        0x00000010:{\"Exemplar Type\"}=Uint32:0:{0x0000001E}\n\
        0x00000020:{\"Exemplar Name\"}=String:18:{\"SG_Prop_Billboard2\"}\n\
        0x27812810:{\"Occupant Size\"}=Float32:3:{10.39999962,7.2249999,2.51600003}\n\
        0x4A9F188B:{\"Light\"}=Bool:0:{True}\n";
    let record = exemplar::parse(text.as_bytes()).unwrap();
    assert!(!record.is_cohort);
    assert!(record.is_text);
    assert_eq!(record.properties.len(), 4);

    let kind = record.find_property(0x10).unwrap();
    assert!(!kind.is_list);
    assert_eq!(kind.values, vec![Value::Uint32(0x1E)]);

    let name = record.find_property(0x20).unwrap();
    assert!(!name.is_list);
    assert_eq!(
        name.values,
        vec![Value::String("SG_Prop_Billboard2".to_string())]
    );

    let size = record.find_property(0x27812810).unwrap();
    assert!(size.is_list);
    assert_eq!(size.values.len(), 3);
    assert_eq!(size.values[0], Value::Float32(10.399_999_62));

    let light = record.find_property(0x4A9F188B).unwrap();
    assert!(!light.is_list);
    assert_eq!(light.values, vec![Value::Bool(true)]);
}

#[test]
fn test_text_exemplar_signed_hex() {
    let text = "EQZT1###\n\
        ParentCohort=Key:{0x00000000,0x00000000,0x00000000}\n\
        PropCount=0x00000002\n\
        0x27812850:{\"Park Effect\"}=Sint32:2:{0xFFFFFFF6,0x0000000A}\n\
        0x27812854:{\"Power\"}=Uint32:0:{0x00000005}\n";
    let record = exemplar::parse(text.as_bytes()).unwrap();
    let prop = record.find_property(0x27812850).unwrap();
    assert_eq!(prop.values, vec![Value::Sint32(-10), Value::Sint32(10)]);
    assert_eq!(record.get_scalar::<u32>(0x27812854), Some(5));
}

#[test]
fn test_text_exemplar_parent_component_order() {
    let text = "CQZT1###\n\
        ParentCohort=Key:{0x11111111,0x22222222,0x33333333}\n\
        PropCount=0\n";
    let record = exemplar::parse(text.as_bytes()).unwrap();
    assert!(record.is_cohort);
    // The text form lists group, instance, type in that order.
    assert_eq!(record.parent, Tgi::new(0x33333333, 0x11111111, 0x22222222));
}

#[test]
fn test_text_exemplar_reports_syntax_errors() {
    let text = "EQZT1###\n\
        ParentCohort=Key:{0x00000000,0x00000000,0x00000000}\n\
        PropCount=0x00000001\n\
        0x00000010:{\"Exemplar Type\"}=Uint32:0:{0x0000001E\n";
    match exemplar::parse(text.as_bytes()) {
        Err(Error::TextSyntax(message)) => assert!(message.contains("property list")),
        other => panic!("expected text syntax error, got {other:?}"),
    }
}

#[test]
fn test_text_exemplar_tolerates_bom_and_name_prefixes() {
    let mut buffer = vec![0xEF, 0xBB, 0xBF];
    buffer.extend_from_slice(
        b"EQZT1###\n\
          ParentCohort=Key:{0x0,0x0,0x0}\n\
          PropCount=1\n\
          0x00000001:{\"Levels\"}=Uint8:2:{Low:1,High:2}\n",
    );
    let record = exemplar::parse(&buffer).unwrap();
    let prop = record.find_property(0x1).unwrap();
    assert!(prop.is_list);
    assert_eq!(prop.values, vec![Value::Uint8(1), Value::Uint8(2)]);
}

#[test]
fn test_text_exemplar_hash_version_variant() {
    let text = "EQZT####\n\
        ParentCohort=Key:{0x0,0x0,0x0}\n\
        PropCount=0\n";
    let record = exemplar::parse(text.as_bytes()).unwrap();
    assert!(record.properties.is_empty());
    assert_eq!(record.find_property(0x1), None);
}

#[test]
fn test_text_exemplar_rejects_out_of_range_hex() {
    let text = "EQZT1###\n\
        ParentCohort=Key:{0x0,0x0,0x0}\n\
        PropCount=1\n\
        0x00000001:{\"Bad\"}=Sint32:0:{0x1FFFFFFFF}\n";
    match exemplar::parse(text.as_bytes()) {
        Err(Error::TextSyntax(message)) => assert!(message.contains("32-bit")),
        other => panic!("expected range error, got {other:?}"),
    }
}

#[test]
fn test_value_type_round_trip() {
    for raw in [0x0100u16, 0x0200, 0x0300, 0x0700, 0x0800, 0x0900, 0x0B00, 0x0C00] {
        let value_type = ValueType::from_raw(raw).unwrap();
        assert_eq!(value_type.raw(), raw);
    }
    assert_eq!(ValueType::from_raw(0x0500), None);
}
