use chrono::{Duration, Timelike, Utc};
use rss_newsroom::feed::fetcher::FeedFetcher;
use rss_newsroom::feed::ingestor::FeedIngestor;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use test_data::*;

/// Integration tests for feed ingestion over HTTP

async fn serve_feed(server: &MockServer, route: &str, body: String, content_type: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", content_type),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_recency_window_over_http() {
    let mock_server = MockServer::start().await;
    let now = Utc::now().with_nanosecond(0).unwrap();
    let window = Duration::days(3);

    let feed = rss_feed(
        "Tech News Daily",
        &[
            Item::new("Just inside", "https://news.example.com/inside", now - window + Duration::seconds(1)),
            Item::new("Just outside", "https://news.example.com/outside", now - window - Duration::seconds(1)),
            Item::new("Yesterday", "https://news.example.com/yesterday", now - Duration::days(1))
                .with_summary("Chip makers report record quarter"),
        ],
    );
    serve_feed(&mock_server, "/tech.xml", feed, "application/rss+xml").await;

    let ingestor = FeedIngestor::new(FeedFetcher::new());
    let urls = vec![format!("{}/tech.xml", mock_server.uri())];
    let report = ingestor.ingest_at(&urls, 3, now).await;

    let titles: Vec<_> = report.articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Just inside", "Yesterday"]);
    assert_eq!(report.articles[1].summary, "Chip makers report record quarter");
    assert_eq!(report.articles[1].link, "https://news.example.com/yesterday");
    assert_eq!(report.feeds[0].kept, 2);
    assert!(report.feeds[0].error.is_none());
}

#[tokio::test]
async fn test_broken_feeds_do_not_stop_ingestion() {
    let mock_server = MockServer::start().await;
    let now = Utc::now();

    serve_feed(
        &mock_server,
        "/good.xml",
        rss_feed("Good", &[Item::new("Kept", "https://news.example.com/kept", now - Duration::hours(2))]),
        "application/rss+xml",
    )
    .await;
    serve_feed(&mock_server, "/garbage.xml", NOT_A_FEED.to_string(), "application/xml").await;
    Mock::given(method("GET"))
        .and(path("/down.xml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let urls = vec![
        format!("{}/down.xml", mock_server.uri()),
        format!("{}/garbage.xml", mock_server.uri()),
        format!("{}/good.xml", mock_server.uri()),
        "ftp://news.example.com/feed".to_string(),
    ];

    let ingestor = FeedIngestor::new(FeedFetcher::new());
    let report = ingestor.ingest(&urls, 3).await;

    assert_eq!(report.articles.len(), 1);
    assert_eq!(report.articles[0].title, "Kept");
    assert_eq!(report.feeds.len(), 4);
    assert_eq!(report.failed_feeds().count(), 3);
    assert_eq!(report.feeds[2].url, urls[2]);
    assert!(report.feeds[2].error.is_none());
}

#[tokio::test]
async fn test_feed_order_is_preserved_across_feeds() {
    let mock_server = MockServer::start().await;
    let now = Utc::now();

    serve_feed(
        &mock_server,
        "/a.xml",
        rss_feed(
            "A",
            &[
                Item::new("a1", "https://a.example.com/1", now - Duration::hours(1)),
                Item::new("a2", "https://a.example.com/2", now - Duration::hours(30)),
            ],
        ),
        "application/rss+xml",
    )
    .await;
    serve_feed(
        &mock_server,
        "/b.xml",
        atom_feed_updated_only(
            "B",
            &[Item::new(UNICODE_ITEM_TITLE, "https://b.example.com/1", now - Duration::hours(3))
                .with_summary("Memory prices climb")],
        ),
        "application/atom+xml",
    )
    .await;

    let urls = vec![
        format!("{}/a.xml", mock_server.uri()),
        format!("{}/b.xml", mock_server.uri()),
        format!("{}/a.xml", mock_server.uri()),
    ];
    let articles = FeedIngestor::new(FeedFetcher::new()).fetch(&urls, 3).await;

    let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["a1", "a2", UNICODE_ITEM_TITLE, "a1", "a2"]);
    assert_eq!(articles[2].summary, "Memory prices climb");
}

#[tokio::test]
async fn test_undated_entries_are_skipped() {
    let mock_server = MockServer::start().await;
    let now = Utc::now();

    serve_feed(
        &mock_server,
        "/mixed.xml",
        rss_feed(
            "Mixed",
            &[
                Item::new("No date", "https://news.example.com/nodate", now).undated(),
                Item::new("Dated", "https://news.example.com/dated", now - Duration::hours(1)),
            ],
        ),
        "application/rss+xml",
    )
    .await;

    let urls = vec![format!("{}/mixed.xml", mock_server.uri())];
    let articles = FeedIngestor::new(FeedFetcher::new()).fetch(&urls, 3).await;

    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].title, "Dated");
    assert_eq!(articles[0].summary, "");
}
