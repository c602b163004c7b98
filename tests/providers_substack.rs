use mention_tracker::fetch::providers::substack::{parse_search_page, query_params};
use mention_tracker::fetch::types::{ContentFilter, DateRange, PageQuery, SearchFilters};
use mention_tracker::fetch::RecordId;

const PAGE_JSON: &str = include_str!("fixtures/substack_search_page.json");

#[test]
fn fixture_page_parses_records_and_tallies_drift() {
    let page = parse_search_page(PAGE_JSON).expect("envelope parses");

    assert_eq!(page.records.len(), 3, "result without id is skipped");
    assert_eq!(page.malformed, 1);
    assert_eq!(page.total_available, Some(3));
    assert!(!page.has_more);

    let first = &page.records[0];
    assert_eq!(first.id, RecordId("158203311".into()));
    assert_eq!(first.publication_name.as_deref(), Some("Dev Notes"));
    assert_eq!(first.reaction_count, 41);
    assert_eq!(
        first.published_date().map(|d| d.to_string()).as_deref(),
        Some("2025-04-28")
    );

    // Empty byline list: no publication name, still a valid record.
    assert!(page.records[1].publication_name.is_none());
    // Null date survives parsing; it is excluded later at bucketing.
    assert!(page.records[2].published_date().is_none());
}

#[test]
fn query_carries_filters() {
    let filters = SearchFilters {
        content: ContentFilter::Paid,
        date_range: Some(DateRange::Week),
        include_platform_results: false,
    };
    let q = PageQuery {
        term: "Claude Code",
        page: 3,
        filters: &filters,
    };
    let params = query_params(&q);
    let get = |k: &str| {
        params
            .iter()
            .find(|(name, _)| *name == k)
            .map(|(_, v)| v.as_str())
    };
    assert_eq!(get("query"), Some("Claude Code"));
    assert_eq!(get("page"), Some("3"));
    assert_eq!(get("filter"), Some("paid"));
    assert_eq!(get("dateRange"), Some("week"));
    assert_eq!(get("includePlatformResults"), Some("false"));
}
