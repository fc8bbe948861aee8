use serde_json::json;

use crate::common::{TestApp, routes};

mod restaurant_creation {
    use super::*;

    #[tokio::test]
    async fn new_restaurant_starts_with_zero_average() {
        let app = TestApp::spawn().await;

        let res = app
            .post(
                routes::RESTAURANTS,
                &json!({
                    "name": "  Cantina da Nonna  ",
                    "category": "Italian",
                    "address": "Rua Augusta, 123",
                    "phone": "(11) 3333-4444",
                }),
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["name"], "Cantina da Nonna");
        assert_eq!(res.body["category"], "Italian");
        assert_eq!(res.body["average_rating"], "0.00");
        assert_eq!(res.body["active"], true);
        assert!(res.body["description"].is_null());
    }

    #[tokio::test]
    async fn invalid_fields_are_rejected() {
        let app = TestApp::spawn().await;

        let cases = [
            json!({ "name": "ab", "category": "Italian" }),
            json!({ "name": "Sushi Place", "category": "Thai" }),
            json!({ "name": "Sushi Place", "category": "Japanese", "phone": "call me" }),
            json!({ "name": "Sushi Place", "category": "Japanese", "address": "a".repeat(501) }),
            json!({ "category": "Japanese" }),
        ];
        for body in cases {
            let res = app.post(routes::RESTAURANTS, &body).await;
            assert_eq!(res.status, 400, "body {body} -> {}", res.text);
            assert_eq!(res.body["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let app = TestApp::spawn().await;

        let res = app
            .client
            .post(format!("http://{}{}", app.addr, routes::RESTAURANTS))
            .header("Content-Type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn duplicate_active_restaurant_conflicts() {
        let app = TestApp::spawn().await;
        let body = json!({ "name": "Burger Joint", "category": "Burger", "address": "Main St 1" });

        assert_eq!(app.post(routes::RESTAURANTS, &body).await.status, 201);
        let res = app.post(routes::RESTAURANTS, &body).await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
    }
}

mod restaurant_listing {
    use super::*;

    #[tokio::test]
    async fn listing_is_ordered_by_average_rating_by_default() {
        let app = TestApp::spawn().await;
        let low = app.create_restaurant("Low Rated", "Pizza").await;
        let high = app.create_restaurant("High Rated", "Pizza").await;
        app.create_review(low, "ana", 2).await;
        app.create_review(high, "ana", 5).await;

        let res = app.get(routes::RESTAURANTS).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["total"], 2);
        assert_eq!(res.body["page"], 1);
        assert_eq!(res.body["limit"], 10);
        assert_eq!(res.body["total_pages"], 1);
        let items = res.body["items"].as_array().unwrap();
        assert_eq!(items[0]["id"], high);
        assert_eq!(items[1]["id"], low);
    }

    #[tokio::test]
    async fn listing_filters_sorts_and_paginates() {
        let app = TestApp::spawn().await;
        app.create_restaurant("Alpha Sushi", "Japanese").await;
        app.create_restaurant("Beta Sushi", "Japanese").await;
        app.create_restaurant("Gamma Tacos", "Mexican").await;

        let res = app
            .get(&format!(
                "{}?category=Japanese&sort=name&direction=ASC&limit=1&page=2",
                routes::RESTAURANTS
            ))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["total"], 2);
        assert_eq!(res.body["total_pages"], 2);
        assert_eq!(res.body["items"][0]["name"], "Beta Sushi");

        let res = app
            .get(&format!("{}?search=TACO", routes::RESTAURANTS))
            .await;
        assert_eq!(res.body["total"], 1);
        assert_eq!(res.body["items"][0]["name"], "Gamma Tacos");
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let app = TestApp::spawn().await;
        app.create_restaurant("Plain Name", "Other").await;

        let res = app.get(&format!("{}?search=%25", routes::RESTAURANTS)).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["total"], 0);
    }

    #[tokio::test]
    async fn invalid_listing_parameters_are_rejected() {
        let app = TestApp::spawn().await;

        let queries = [
            "page=0",
            "page=18446744073709551615",
            "limit=101",
            "sort=phone",
            "direction=up",
            "category=Thai",
        ];
        for query in queries {
            let res = app.get(&format!("{}?{query}", routes::RESTAURANTS)).await;
            assert_eq!(res.status, 400, "{query} -> {}", res.text);
        }
    }

    #[tokio::test]
    async fn cached_listing_reflects_new_average_after_review() {
        let app = TestApp::spawn().await;
        let id = app.create_restaurant("Cache Check", "Arabic").await;

        let before = app.get(routes::RESTAURANTS).await;
        assert_eq!(before.body["items"][0]["average_rating"], "0.00");

        app.create_review(id, "ana", 4).await;

        let after = app.get(routes::RESTAURANTS).await;
        assert_eq!(after.body["items"][0]["average_rating"], "4.00");
    }

    #[tokio::test]
    async fn without_invalidation_listing_stays_cached_until_ttl() {
        let app = TestApp::spawn_with_cache(::common::CacheConfig {
            listing_ttl_secs: 300,
            sweep_interval_secs: 60,
            invalidate_on_write: false,
        })
        .await;
        let id = app.create_restaurant("Stale Check", "Arabic").await;

        let before = app.get(routes::RESTAURANTS).await;
        assert_eq!(before.body["items"][0]["average_rating"], "0.00");

        app.create_review(id, "ana", 4).await;

        let after = app.get(routes::RESTAURANTS).await;
        assert_eq!(after.body["items"][0]["average_rating"], "0.00");
        assert_eq!(app.average_of(id).await, "4.00");
    }

    #[tokio::test]
    async fn top_rated_and_category_views() {
        let app = TestApp::spawn().await;
        let a = app.create_restaurant("Veggie One", "Vegetarian").await;
        let b = app.create_restaurant("Veggie Two", "Vegetarian").await;
        app.create_restaurant("Burger One", "Burger").await;
        app.create_review(a, "ana", 3).await;
        app.create_review(b, "ana", 5).await;

        let top = app.get(&format!("{}?limit=1", routes::TOP_RATED)).await;
        assert_eq!(top.status, 200);
        assert_eq!(top.body["items"].as_array().unwrap().len(), 1);
        assert_eq!(top.body["items"][0]["id"], b);

        let res = app.get(&format!("{}?limit=51", routes::TOP_RATED)).await;
        assert_eq!(res.status, 400);

        let veg = app.get(&routes::restaurants_in_category("Vegetarian")).await;
        assert_eq!(veg.status, 200);
        assert_eq!(veg.body["category"], "Vegetarian");
        assert_eq!(veg.body["total"], 2);
        assert_eq!(veg.body["items"][0]["id"], b);

        let res = app.get(&routes::restaurants_in_category("Thai")).await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn stats_count_active_restaurants_only() {
        let app = TestApp::spawn().await;
        let a = app.create_restaurant("Stats One", "Pizza").await;
        app.create_restaurant("Stats Two", "Pizza").await;
        let c = app.create_restaurant("Stats Three", "Mexican").await;
        app.create_review(a, "ana", 3).await;
        app.create_review(c, "ana", 5).await;
        assert_eq!(app.delete(&routes::restaurant(c)).await.status, 204);

        let res = app.get(routes::RESTAURANT_STATS).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["total_restaurants"], 2);
        assert_eq!(res.body["total_reviews"], 1);
        assert_eq!(
            res.body["by_category"],
            json!([{ "category": "Pizza", "total": 2 }])
        );
    }
}

mod restaurant_detail {
    use super::*;

    #[tokio::test]
    async fn detail_embeds_latest_ten_reviews() {
        let app = TestApp::spawn().await;
        let id = app.create_restaurant("Busy Place", "Brazilian").await;
        for i in 0..12 {
            app.create_review(id, &format!("author {i}"), 4).await;
        }

        let res = app.get(&routes::restaurant(id)).await;

        assert_eq!(res.status, 200);
        let reviews = res.body["reviews"].as_array().unwrap();
        assert_eq!(reviews.len(), 10);
        assert_eq!(reviews[0]["author"], "author 11");
        assert_eq!(res.body["average_rating"], "4.00");
    }

    #[tokio::test]
    async fn missing_restaurant_is_404() {
        let app = TestApp::spawn().await;

        let res = app.get(&routes::restaurant(9999)).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }
}

mod restaurant_update {
    use super::*;

    #[tokio::test]
    async fn put_replaces_all_fields() {
        let app = TestApp::spawn().await;
        let res = app
            .post(
                routes::RESTAURANTS,
                &json!({
                    "name": "Old Name",
                    "category": "Other",
                    "phone": "1234",
                    "description": "old",
                }),
            )
            .await;
        let id = res.id();

        let res = app
            .put(
                &routes::restaurant(id),
                &json!({ "name": "New Name", "category": "Pizza" }),
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["name"], "New Name");
        assert_eq!(res.body["category"], "Pizza");
        assert!(res.body["phone"].is_null());
        assert!(res.body["description"].is_null());
    }

    #[tokio::test]
    async fn patch_changes_only_given_fields_and_null_clears() {
        let app = TestApp::spawn().await;
        let res = app
            .post(
                routes::RESTAURANTS,
                &json!({
                    "name": "Patch Me",
                    "category": "Other",
                    "phone": "1234",
                    "description": "keep",
                }),
            )
            .await;
        let id = res.id();

        let res = app
            .patch(&routes::restaurant(id), &json!({ "phone": null }))
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["name"], "Patch Me");
        assert_eq!(res.body["description"], "keep");
        assert!(res.body["phone"].is_null());

        let empty = app.patch(&routes::restaurant(id), &json!({})).await;
        assert_eq!(empty.status, 200);
        assert_eq!(empty.body["description"], "keep");
    }

    #[tokio::test]
    async fn update_of_missing_restaurant_is_404() {
        let app = TestApp::spawn().await;

        let res = app
            .patch(&routes::restaurant(4242), &json!({ "name": "Nobody" }))
            .await;

        assert_eq!(res.status, 404);
    }
}

mod restaurant_deletion {
    use super::*;

    #[tokio::test]
    async fn soft_delete_hides_from_listing_and_is_idempotent() {
        let app = TestApp::spawn().await;
        let id = app.create_restaurant("Soon Gone", "Other").await;

        assert_eq!(app.delete(&routes::restaurant(id)).await.status, 204);
        assert_eq!(app.delete(&routes::restaurant(id)).await.status, 204);

        let list = app.get(routes::RESTAURANTS).await;
        assert_eq!(list.body["total"], 0);

        let detail = app.get(&routes::restaurant(id)).await;
        assert_eq!(detail.status, 200);
        assert_eq!(detail.body["active"], false);
    }

    #[tokio::test]
    async fn restore_brings_restaurant_back() {
        let app = TestApp::spawn().await;
        let id = app.create_restaurant("Comeback", "Other").await;
        app.delete(&routes::restaurant(id)).await;

        let res = app.post_empty(&routes::restaurant_restore(id)).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["active"], true);
        assert_eq!(app.get(routes::RESTAURANTS).await.body["total"], 1);
    }

    #[tokio::test]
    async fn hard_delete_conflicts_while_reviews_exist() {
        let app = TestApp::spawn().await;
        let id = app.create_restaurant("Reviewed", "Other").await;
        let review_id = app.create_review(id, "ana", 5).await;

        let res = app.delete(&routes::restaurant_permanent(id)).await;
        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");

        assert_eq!(app.delete(&routes::review(review_id)).await.status, 200);

        let res = app.delete(&routes::restaurant_permanent(id)).await;
        assert_eq!(res.status, 204, "{}", res.text);
        assert_eq!(app.get(&routes::restaurant(id)).await.status, 404);
    }
}
