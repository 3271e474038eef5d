//! Integration tests across taxonomy, content and export

mod common;

use common::TestEngine;
use newsdesk::content::{NewsOrder, NewsQuery};
use newsdesk::feed::export::{render_rss, ChannelInfo};

/// Category scoping includes subcategories through descendant expansion
#[test]
fn test_category_scope_includes_descendants() {
    let engine = TestEngine::new();
    let world = engine.category("World", None);
    let europe = engine.category("Europe", Some(world.id));
    let asia = engine.category("Asia", Some(world.id));
    let local = engine.category("Local", None);

    engine.published_article("Europe story", Some(europe.id));
    engine.published_article("Asia story", Some(asia.id));
    engine.published_article("World story", Some(world.id));
    engine.published_article("Local story", Some(local.id));

    let scope = engine.categories.descendant_ids(world.id).unwrap();
    let scoped = engine
        .news
        .list(&NewsQuery {
            effectively_published: true,
            category_ids: scope,
            ..Default::default()
        })
        .unwrap();

    assert_eq!(scoped.len(), 3);
    assert!(scoped.iter().all(|n| n.title != "Local story"));

    assert_eq!(
        engine
            .categories
            .total_news_count(world.id, chrono::Utc::now())
            .unwrap(),
        3
    );
}

/// Category popularity ranks by lifetime published count, per category alone
#[test]
fn test_popular_categories_lifetime_count() {
    let engine = TestEngine::new();
    let busy = engine.category("Busy", None);
    let quiet = engine.category("Quiet", None);

    for i in 0..3 {
        engine.published_article(&format!("Busy {i}"), Some(busy.id));
    }
    engine.published_article("Quiet 0", Some(quiet.id));

    // Drafts do not count
    engine
        .news
        .create(newsdesk::content::NewNews {
            category_id: Some(quiet.id),
            ..newsdesk::content::NewNews::new("Quiet draft", "body", 1)
        })
        .unwrap();

    let ranked = engine.categories.popular(10, chrono::Utc::now()).unwrap();
    assert_eq!(ranked[0].category.name, "Busy");
    assert_eq!(ranked[0].published_news_count, 3);
    assert_eq!(ranked[1].published_news_count, 1);
}

/// Category deletion is blocked while articles exist, then succeeds
#[test]
fn test_category_delete_guard_with_articles() {
    let engine = TestEngine::new();
    let section = engine.category("Section", None);
    let article = engine.published_article("Only story", Some(section.id));

    assert!(matches!(
        engine.categories.delete(section.id),
        Err(newsdesk::Error::Conflict(_))
    ));

    engine.news.delete(article.id).unwrap();
    engine.categories.delete(section.id).unwrap();
}

/// The exported feed carries only effectively-published articles, newest first
#[test]
fn test_rss_export_end_to_end() {
    let engine = TestEngine::new();
    engine.published_article("Published story", None);
    engine
        .news
        .create(newsdesk::content::NewNews::new("Draft story", "body", 1))
        .unwrap();

    let articles = engine
        .news
        .list(&NewsQuery {
            effectively_published: true,
            order: NewsOrder::Latest,
            limit: Some(20),
            ..Default::default()
        })
        .unwrap();

    let xml = render_rss(
        &ChannelInfo {
            title: "Example Desk".to_string(),
            description: "Latest".to_string(),
            link: "https://example.com".to_string(),
        },
        &articles,
    );

    assert!(xml.contains("<title>Published story</title>"));
    assert!(!xml.contains("Draft story"));
    assert!(xml.contains("<guid>https://example.com/news/published-story</guid>"));
}

/// Tag attach blocks deletion until the article releases it
#[test]
fn test_tag_delete_guard_via_attachment() {
    let engine = TestEngine::new();
    let tag = engine
        .tags
        .create(newsdesk::taxonomy::NewTag {
            title: "Economy".to_string(),
            ..Default::default()
        })
        .unwrap();
    let article = engine.published_article("Tagged story", None);

    engine.news.set_tags(article.id, &[tag.id]).unwrap();
    assert!(matches!(
        engine.tags.delete(tag.id),
        Err(newsdesk::Error::Conflict(_))
    ));

    engine.news.set_tags(article.id, &[]).unwrap();
    engine.tags.delete(tag.id).unwrap();
}
