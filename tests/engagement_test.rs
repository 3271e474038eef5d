//! Integration tests for comments, reactions and view-driven trending

mod common;

use common::TestEngine;
use newsdesk::engagement::{NewComment, ViewContext};
use newsdesk::models::{Actor, CommentAuthor, CommentStatus, Identity, ReactionKind, Role};

/// Full moderation flow: pending submission, approval, counts
#[test]
fn test_comment_moderation_flow() {
    let engine = TestEngine::new();
    let article = engine.published_article("Debated story", None);
    let admin = Actor::new(1, Role::Admin);

    let top = engine
        .comments
        .submit(
            NewComment {
                news_id: article.id,
                parent_id: None,
                content: "First!".to_string(),
                author: CommentAuthor::Guest {
                    name: "Reader".to_string(),
                    email: "reader@example.com".to_string(),
                },
                ip_address: Some("203.0.113.1".to_string()),
            },
            None,
        )
        .unwrap();
    assert_eq!(top.status, CommentStatus::Pending);

    // Invisible until approved
    assert!(engine.comments.for_news(article.id).unwrap().is_empty());
    assert_eq!(engine.comments.pending().unwrap().len(), 1);

    engine.comments.approve(top.id).unwrap();
    assert_eq!(engine.comments.for_news(article.id).unwrap().len(), 1);

    // A reply approved by an admin bumps the parent's replies_count
    engine
        .comments
        .submit(
            NewComment {
                news_id: article.id,
                parent_id: Some(top.id),
                content: "Agreed".to_string(),
                author: CommentAuthor::Registered { user_id: 1 },
                ip_address: None,
            },
            Some(&admin),
        )
        .unwrap();

    let top = engine.comments.get(top.id).unwrap();
    assert_eq!(top.replies_count, 1);
    assert_eq!(engine.comments.approved_count(article.id).unwrap(), 2);
}

/// The reaction invariant holds across a mixed sequence for two identities
#[test]
fn test_reaction_toggle_invariant() {
    let engine = TestEngine::new();
    let article = engine.published_article("Reacted story", None);

    let user = Identity::registered(5);
    let visitor = Identity::anonymous("203.0.113.7");

    engine.reactions.set_reaction(article.id, ReactionKind::Like, &user).unwrap();
    engine.reactions.set_reaction(article.id, ReactionKind::Like, &visitor).unwrap();

    // User un-likes, visitor flips to dislike
    engine.reactions.set_reaction(article.id, ReactionKind::Like, &user).unwrap();
    engine
        .reactions
        .set_reaction(article.id, ReactionKind::Dislike, &visitor)
        .unwrap();

    let counts = engine.reactions.counts(article.id).unwrap();
    assert_eq!(counts.likes, 0);
    assert_eq!(counts.dislikes, 1);

    assert_eq!(engine.reactions.reaction_of(article.id, &user).unwrap(), None);
    assert_eq!(
        engine.reactions.reaction_of(article.id, &visitor).unwrap(),
        Some(ReactionKind::Dislike)
    );
}

/// Recorded views feed both the lifetime counter and windowed trending
#[test]
fn test_views_drive_trending() {
    let engine = TestEngine::new();
    let hot = engine.published_article("Hot story", None);
    let cold = engine.published_article("Cold story", None);

    for i in 0..5 {
        engine
            .views
            .record(
                hot.id,
                &Identity::anonymous(format!("203.0.113.{i}")),
                &ViewContext::default(),
            )
            .unwrap();
    }

    assert_eq!(engine.news.get(hot.id).unwrap().views_count, 5);
    assert_eq!(engine.news.get(cold.id).unwrap().views_count, 0);

    let trending = engine.news.trending(7, 10).unwrap();
    assert_eq!(trending.len(), 1);
    assert_eq!(trending[0].news.id, hot.id);
    assert_eq!(trending[0].recent_views, 5);
}

/// Comments obey the enable/moderate settings read through the cache
#[test]
fn test_moderation_setting_toggle() {
    let engine = TestEngine::new();
    let article = engine.published_article("Settings story", None);

    engine
        .settings
        .set(
            "moderate_comments",
            newsdesk::settings::SettingValue::Boolean(false),
            Default::default(),
        )
        .unwrap();

    let comment = engine
        .comments
        .submit(
            NewComment {
                news_id: article.id,
                parent_id: None,
                content: "Straight through".to_string(),
                author: CommentAuthor::Guest {
                    name: "Reader".to_string(),
                    email: "reader@example.com".to_string(),
                },
                ip_address: None,
            },
            None,
        )
        .unwrap();

    assert_eq!(comment.status, CommentStatus::Approved);
}
