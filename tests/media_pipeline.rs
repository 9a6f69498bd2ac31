mod common;

use std::collections::HashSet;

use momentos::db::models::{EventStatus, FilterTag, MediaKind};
use momentos::error::AppError;
use momentos::events::{EventPatch, NewEvent};
use momentos::media::{FeedEvent, LikeDelta, NewMedia};
use momentos::plans::PlanId;
use momentos::storage::Namespace;

use common::{count_files, create_event, png_upload, test_state, video_upload};

fn new_media(author: &str, file: momentos::media::normalizer::RawUpload) -> NewMedia {
    NewMedia {
        author: author.to_string(),
        caption: Some("First dance".to_string()),
        filter: FilterTag::None,
        file,
    }
}

#[tokio::test]
async fn uploaded_photo_is_listed_with_its_metadata() {
    let (_dir, state) = test_state().await;
    let event = create_event(&state, PlanId::Premium).await;

    let created = state
        .media
        .create(&event, new_media("Marta", png_upload()))
        .await
        .unwrap();

    let listed = state.media.list(&event.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    let item = &listed[0];
    assert_eq!(item.id, created.id);
    assert_eq!(item.author, "Marta");
    assert_eq!(item.caption.as_deref(), Some("First dance"));
    assert_eq!(item.kind, MediaKind::Image);
    assert_eq!(item.likes, 0);
    assert!(item.comments.is_empty());

    let bytes = state.blobs.read(&item.url).await.unwrap();
    assert!(bytes.is_some(), "stored blob should be readable");
}

#[tokio::test]
async fn list_is_newest_first_and_scoped_to_the_event() {
    let (_dir, state) = test_state().await;
    let event = create_event(&state, PlanId::Premium).await;
    let other = create_event(&state, PlanId::Premium).await;

    let first = state
        .media
        .create(&event, new_media("Marta", png_upload()))
        .await
        .unwrap();
    let second = state
        .media
        .create(&event, new_media("Jorge", png_upload()))
        .await
        .unwrap();
    state
        .media
        .create(&other, new_media("Elsewhere", png_upload()))
        .await
        .unwrap();

    let ids: Vec<String> = state
        .media
        .list(&event.id)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_likes_are_not_lost() {
    let (_dir, state) = test_state().await;
    let event = create_event(&state, PlanId::Premium).await;
    let item = state
        .media
        .create(&event, new_media("Marta", png_upload()))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let media = state.media.clone();
        let (event_id, item_id) = (event.id.clone(), item.id.clone());
        handles.push(tokio::spawn(async move {
            media.like(&event_id, &item_id, LikeDelta::Up).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = state.media.get(&event.id, &item.id).await.unwrap();
    assert_eq!(stored.likes, 10);
}

#[tokio::test]
async fn likes_never_go_negative() {
    let (_dir, state) = test_state().await;
    let event = create_event(&state, PlanId::Premium).await;
    let item = state
        .media
        .create(&event, new_media("Marta", png_upload()))
        .await
        .unwrap();

    let likes = state
        .media
        .like(&event.id, &item.id, LikeDelta::Down)
        .await
        .unwrap();
    assert_eq!(likes, 0);

    state
        .media
        .like(&event.id, &item.id, LikeDelta::Up)
        .await
        .unwrap();
    let likes = state
        .media
        .like(&event.id, &item.id, LikeDelta::Down)
        .await
        .unwrap();
    assert_eq!(likes, 0);
}

#[tokio::test]
async fn like_on_missing_media_is_not_found() {
    let (_dir, state) = test_state().await;
    let event = create_event(&state, PlanId::Premium).await;

    let err = state
        .media
        .like(&event.id, "no-such-photo", LikeDelta::Up)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_comments_are_all_kept() {
    let (_dir, state) = test_state().await;
    let event = create_event(&state, PlanId::Premium).await;
    let item = state
        .media
        .create(&event, new_media("Marta", png_upload()))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let media = state.media.clone();
        let (event_id, item_id) = (event.id.clone(), item.id.clone());
        handles.push(tokio::spawn(async move {
            media
                .comment(&event_id, &item_id, &format!("Guest {}", i), "Beautiful!")
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = state.media.get(&event.id, &item.id).await.unwrap();
    assert_eq!(stored.comments.len(), 8);
    let authors: HashSet<&str> = stored.comments.iter().map(|c| c.author.as_str()).collect();
    assert_eq!(authors.len(), 8);
}

#[tokio::test]
async fn blank_comment_is_rejected() {
    let (_dir, state) = test_state().await;
    let event = create_event(&state, PlanId::Premium).await;
    let item = state
        .media
        .create(&event, new_media("Marta", png_upload()))
        .await
        .unwrap();

    let err = state
        .media
        .comment(&event.id, &item.id, "Jorge", "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn deleting_twice_succeeds_and_removes_the_blob() {
    let (_dir, state) = test_state().await;
    let event = create_event(&state, PlanId::Premium).await;
    let item = state
        .media
        .create(&event, new_media("Marta", png_upload()))
        .await
        .unwrap();

    let first = state
        .media
        .delete(&event.id, &item.id, Some(&item.url))
        .await
        .unwrap();
    assert!(first.removed_record);
    assert!(first.removed_blob);

    let second = state
        .media
        .delete(&event.id, &item.id, Some(&item.url))
        .await
        .unwrap();
    assert!(!second.removed_record);
    assert!(!second.removed_blob);

    assert!(state.media.list(&event.id).await.unwrap().is_empty());
    assert!(state.blobs.read(&item.url).await.unwrap().is_none());
}

#[tokio::test]
async fn create_and_delete_are_announced_on_the_feed() {
    let (_dir, state) = test_state().await;
    let event = create_event(&state, PlanId::Premium).await;
    let mut rx = state.media.hub().subscribe();

    let item = state
        .media
        .create(&event, new_media("Marta", png_upload()))
        .await
        .unwrap();
    state.media.delete(&event.id, &item.id, None).await.unwrap();

    match rx.recv().await.unwrap() {
        FeedEvent::Created { media_id, .. } => assert_eq!(media_id, item.id),
        other => panic!("expected created, got {:?}", other),
    }
    match rx.recv().await.unwrap() {
        FeedEvent::Deleted { media_id, .. } => assert_eq!(media_id, item.id),
        other => panic!("expected deleted, got {:?}", other),
    }
}

#[tokio::test]
async fn video_needs_a_plan_that_allows_it() {
    let (dir, state) = test_state().await;
    let event = create_event(&state, PlanId::Basico).await;
    let media_dir = dir.path().join("uploads").join("events").join(&event.id);

    let err = state
        .media
        .create(&event, new_media("Marta", video_upload()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnsupportedMedia(_)));
    assert_eq!(count_files(&media_dir), 0, "rejected upload wrote a blob");

    let event = state
        .events
        .update(
            &event.id,
            EventPatch {
                plan: Some(PlanId::Deluxe),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(event.features.allow_gifs);

    let item = state
        .media
        .create(&event, new_media("Marta", video_upload()))
        .await
        .unwrap();
    assert_eq!(item.kind, MediaKind::Video);
    assert_eq!(state.media.list(&event.id).await.unwrap().len(), 1);
    assert_eq!(count_files(&media_dir), 1);
}

#[tokio::test]
async fn filters_need_a_plan_that_allows_them() {
    let (_dir, state) = test_state().await;
    let event = create_event(&state, PlanId::Basico).await;

    let err = state
        .media
        .create(
            &event,
            NewMedia {
                filter: FilterTag::Sepia,
                ..new_media("Marta", png_upload())
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn plan_edits_do_not_reach_existing_events() {
    let (_dir, state) = test_state().await;
    let event = create_event(&state, PlanId::Basico).await;

    let mut plans = state.plans.list().await;
    for plan in plans.iter_mut().filter(|p| p.name == PlanId::Basico) {
        plan.features.allow_gifs = true;
        plan.features.tv_carousel = true;
    }
    state.plans.replace_all(plans).await.unwrap();

    let stored = state.events.get(&event.id).await.unwrap();
    assert!(!stored.features.allow_gifs);
    assert!(!stored.features.tv_carousel);

    let fresh = create_event(&state, PlanId::Basico).await;
    assert!(fresh.features.allow_gifs);
}

#[tokio::test]
async fn inactive_event_refuses_guests_until_reactivated() {
    let (_dir, state) = test_state().await;
    let event = create_event(&state, PlanId::Premium).await;
    assert!(state.events.open_for_guests(&event.id).await.is_ok());

    state
        .events
        .update(
            &event.id,
            EventPatch {
                status: Some(EventStatus::Inactive),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let err = state.events.open_for_guests(&event.id).await.unwrap_err();
    assert!(matches!(err, AppError::EventUnavailable));

    state
        .events
        .update(
            &event.id,
            EventPatch {
                status: Some(EventStatus::Active),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(state.events.open_for_guests(&event.id).await.is_ok());
}

#[tokio::test]
async fn deleting_an_event_removes_its_media() {
    let (dir, state) = test_state().await;
    let event = create_event(&state, PlanId::Premium).await;
    state
        .media
        .create(&event, new_media("Marta", png_upload()))
        .await
        .unwrap();

    state.events.delete(&event.id).await.unwrap();

    assert!(matches!(
        state.events.get(&event.id).await.unwrap_err(),
        AppError::NotFound
    ));
    assert!(state.media.list(&event.id).await.unwrap().is_empty());
    let media_dir = dir.path().join("uploads").join("events").join(&event.id);
    assert!(!media_dir.exists());
}

#[tokio::test]
async fn price_outside_the_plan_range_is_rejected() {
    let (_dir, state) = test_state().await;

    let err = state
        .events
        .create(NewEvent {
            couple_names: "Ana & Luis".to_string(),
            date: common::today(),
            plan: PlanId::Basico,
            price: Some(99_999),
            logo: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let event = create_event(&state, PlanId::Deluxe).await;
    assert_eq!(event.price, 4000);
}

#[tokio::test]
async fn stale_delete_never_removes_bytes_of_live_media() {
    let (_dir, state) = test_state().await;
    let event = create_event(&state, PlanId::Premium).await;
    let live = state
        .media
        .create(&event, new_media("Marta", png_upload()))
        .await
        .unwrap();

    let outcome = state
        .media
        .delete(&event.id, "already-gone", Some(&live.url))
        .await
        .unwrap();
    assert!(!outcome.removed_record);
    assert!(!outcome.removed_blob);

    assert_eq!(state.media.list(&event.id).await.unwrap().len(), 1);
    assert!(state.blobs.read(&live.url).await.unwrap().is_some());
}

#[tokio::test]
async fn stale_delete_still_clears_unreferenced_bytes() {
    let (_dir, state) = test_state().await;
    let event = create_event(&state, PlanId::Premium).await;
    let orphan = state
        .blobs
        .put(
            &Namespace::EventMedia(event.id.clone()),
            "png",
            common::png_bytes(),
        )
        .await
        .unwrap();

    let outcome = state
        .media
        .delete(&event.id, "already-gone", Some(&orphan.url))
        .await
        .unwrap();
    assert!(!outcome.removed_record);
    assert!(outcome.removed_blob);
    assert!(state.blobs.read(&orphan.url).await.unwrap().is_none());
}

#[tokio::test]
async fn closing_an_event_is_announced_on_the_feed() {
    let (_dir, state) = test_state().await;
    let event = create_event(&state, PlanId::Premium).await;
    let mut rx = state.media.hub().subscribe();

    state
        .events
        .update(
            &event.id,
            EventPatch {
                status: Some(EventStatus::Inactive),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(
        rx.recv().await.unwrap(),
        FeedEvent::Closed {
            event_id: event.id.clone()
        }
    );
}

#[tokio::test]
async fn replacing_a_logo_removes_the_old_one() {
    let (_dir, state) = test_state().await;
    let event = state
        .events
        .create(NewEvent {
            couple_names: "Ana & Luis".to_string(),
            date: common::today(),
            plan: PlanId::Premium,
            price: None,
            logo: Some(png_upload()),
        })
        .await
        .unwrap();
    let first_logo = event.logo_url.clone().expect("logo stored");
    assert!(state.blobs.read(&first_logo).await.unwrap().is_some());

    let updated = state
        .events
        .update(
            &event.id,
            EventPatch {
                logo: Some(png_upload()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let second_logo = updated.logo_url.clone().expect("logo replaced");

    assert_ne!(first_logo, second_logo);
    assert!(state.blobs.read(&first_logo).await.unwrap().is_none());
    assert!(state.blobs.read(&second_logo).await.unwrap().is_some());
    assert_eq!(
        state.events.get(&event.id).await.unwrap().logo_url,
        Some(second_logo)
    );
}

#[tokio::test]
async fn plan_table_rejects_absurd_access_durations() {
    let (_dir, state) = test_state().await;
    let event = create_event(&state, PlanId::Basico).await;

    let mut plans = state.plans.list().await;
    for plan in plans.iter_mut().filter(|p| p.name == PlanId::Basico) {
        plan.features.access_duration_days = u32::MAX;
    }
    assert!(state.plans.replace_all(plans).await.is_err());

    assert!(state.events.open_for_guests(&event.id).await.is_ok());
}

#[tokio::test]
async fn failed_event_insert_removes_the_stored_logo() {
    let (_dir, state) = test_state().await;
    state
        .db
        .get()
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER refuse_events BEFORE INSERT ON events
             BEGIN SELECT RAISE(ABORT, 'refused'); END;",
        )
        .unwrap();

    let result = state
        .events
        .create(NewEvent {
            couple_names: "Ana & Luis".to_string(),
            date: common::today(),
            plan: PlanId::Premium,
            price: None,
            logo: Some(png_upload()),
        })
        .await;
    assert!(result.is_err());

    let logos_dir = state.config.uploads_path().join("logos");
    assert_eq!(count_files(&logos_dir), 0, "unsaved event kept its logo");
}
