use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use harvest_core::{
    AppError, FanIn, FanInInput, FutureHandle, Record, SchemaResolver, record_type,
};

record_type! {
    /// Listing extracted from a real estate page.
    pub struct Listing { url, price, address }
}

/// Stand-in for the transport layer: resolves to extracted JSON after a delay.
fn fetch_listing(url: &'static str, delay_ms: u64) -> FutureHandle<serde_json::Value, String> {
    FutureHandle::new(async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        if url.ends_with("/gone") {
            return Err(format!("404 for {url}"));
        }
        Ok(json!({ "url": url, "price": 100 + delay_ms }))
    })
}

#[tokio::test]
async fn joined_fetches_become_records_in_request_order() {
    let (join, results) = FanIn::<serde_json::Value, String>::channel(vec![
        fetch_listing("https://example.com/a", 30).into(),
        FanInInput::ready(json!({ "url": "https://example.com/cached", "price": 1 })),
        fetch_listing("https://example.com/gone", 5).into(),
        fetch_listing("https://example.com/b", 1).into(),
    ]);
    assert_eq!(join.len(), 4);

    let results = results.await.unwrap();
    assert!(join.is_fired());

    let urls: Vec<Option<String>> = results
        .iter()
        .map(|result| {
            result
                .as_ref()
                .ok()
                .and_then(|data| data["url"].as_str().map(str::to_string))
        })
        .collect();
    assert_eq!(
        urls,
        vec![
            Some("https://example.com/a".to_string()),
            Some("https://example.com/cached".to_string()),
            None,
            Some("https://example.com/b".to_string()),
        ]
    );

    let listings: Vec<Listing> = results
        .iter()
        .filter_map(|result| result.as_ref().ok())
        .map(|data| Listing::from_json(data).unwrap())
        .collect();
    assert_eq!(listings.len(), 3);
    assert_eq!(listings[0].price(), Some(&json!(130)));
    assert_eq!(listings[0].address(), None);
    assert_eq!(listings[0].len(), 2);
    assert_eq!(
        listings[1].to_string(),
        r#"Listing(url="https://example.com/cached",price=1)"#
    );
}

#[test]
fn listing_access_surfaces() {
    let mut listing = Listing::build(
        [json!("https://example.com/a")],
        [("address", json!("1 Main St"))],
    )
    .unwrap();

    listing.set_price(250_000);
    listing.set_attr("scraped_by", "worker-1");

    assert_eq!(listing.len(), 3);
    assert_eq!(listing.attr("scraped_by"), Some(&json!("worker-1")));
    assert!(matches!(
        listing.get("scraped_by"),
        Err(AppError::FieldNotDeclared(_))
    ));
    assert_eq!(
        listing.fields().collect::<Vec<_>>(),
        vec!["url", "price", "address"]
    );
    assert_eq!(
        serde_json::to_value(&listing).unwrap(),
        json!({"url": "https://example.com/a", "price": 250000, "address": "1 Main St"})
    );

    let err = Listing::build([json!("a")], [("url", json!("b"))]).unwrap_err();
    assert!(matches!(err, AppError::DuplicateFieldAssignment(_)));
}

#[test]
fn resolved_schema_builds_records() {
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = tmp.path().join("article");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("1.0.0.json"),
        r#"{"name": "Article", "fields": ["url", "title"]}"#,
    )
    .unwrap();
    std::fs::write(tmp.path().join("registry.json"), r#"{"article": "1.0.0"}"#).unwrap();

    let resolved = SchemaResolver::new(tmp.path())
        .resolve("article@latest")
        .unwrap();
    let schema = Arc::clone(&resolved.schema);

    let by_position = Record::from_positional(Arc::clone(&schema), [json!("u"), json!("t")]).unwrap();
    let by_name =
        Record::from_named(schema, [("title", json!("t")), ("url", json!("u"))]).unwrap();

    assert_eq!(by_position, by_name);
    assert_eq!(by_position.to_string(), r#"Article(url="u",title="t")"#);
    assert_eq!(
        by_position.content_hash().unwrap(),
        by_name.content_hash().unwrap()
    );
}
