use citetrace_core::{
    citation_key, compress_prompt_ids, decompress_prompt_ids, scan, Citation, KEY_LEN,
};

const REPORT: &str = "Revenue grew 45%<cite attachment_id='abc123' page_number='3' \
    full_phrase='Revenue grew 45% in Q4.' anchor_text='grew 45%' line_ids='12,13' /> \
    according to reports.";

#[test]
fn scan_builds_stable_keys() {
    let first = scan(REPORT);
    let second = scan(REPORT);
    assert_eq!(first.citations.len(), 1);

    let citation = &first.citations[0];
    assert_eq!(citation.attachment_id.as_deref(), Some("abc123"));
    assert_eq!(citation.page_number, Some(3));
    assert_eq!(citation.line_ids, Some(vec![12, 13]));
    assert_eq!(citation.citation_number, 1);

    let key = first.by_key.keys().next().expect("key");
    assert_eq!(key.len(), KEY_LEN);
    assert_eq!(second.by_key.keys().next(), Some(key));
    assert_eq!(citation_key(citation), *key);
}

#[test]
fn document_and_url_shapes_share_keys_without_url_data() {
    let base = Citation {
        attachment_id: Some("abc123".to_string()),
        page_number: Some(3),
        full_phrase: Some("Revenue grew 45% in Q4.".to_string()),
        anchor_text: Some("grew 45%".to_string()),
        citation_number: 1,
        ..Citation::default()
    };
    // Same base fields arriving through the URL-citation code path, but with
    // no URL data attached.
    let url_shaped = Citation {
        citation_number: 9,
        site_name: None,
        ..base.clone()
    };
    assert_eq!(citation_key(&base), citation_key(&url_shaped));

    let with_url = Citation {
        url: Some("https://example.com/q4".to_string()),
        ..base.clone()
    };
    assert_ne!(citation_key(&base), citation_key(&with_url));
}

#[test]
fn compression_round_trips_across_aliases_and_quotes() {
    let ids = vec![
        "file_ABC123def456".to_string(),
        "file_ABC999zzz".to_string(),
    ];
    let text = "intro <cite attachment_id='file_ABC123def456' page_number='1' /> \
        mid <cite attachmentID=\"file_ABC999zzz\" /> \
        tail <cite file_ID=`file_ABC123def456` anchor_text='x \\' y' />";
    let out = compress_prompt_ids(text, &ids).expect("compress");
    assert_eq!(out.prefix_map.len(), 2);
    assert!(!out.text.contains("file_ABC123def456"));
    assert!(!out.text.contains("file_ABC999zzz"));

    let restored = decompress_prompt_ids(&out.text, &out.prefix_map).expect("decompress");
    assert_eq!(restored, text);
}

#[test]
fn compression_with_no_ids_is_identity() {
    let out = compress_prompt_ids(REPORT, &[]).expect("compress");
    assert_eq!(out.text, REPORT);
    assert!(out.prefix_map.is_empty());
}
