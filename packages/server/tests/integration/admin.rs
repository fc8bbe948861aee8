use crate::common::{TestApp, routes};

mod recompute {
    use super::*;

    #[tokio::test]
    async fn recompute_one_repairs_a_drifted_average() {
        let app = TestApp::spawn().await;
        let id = app.create_restaurant("Drifted", "Italian").await;
        app.create_review(id, "ana", 4).await;
        app.create_review(id, "bruno", 5).await;
        app.overwrite_average(id, "9.99").await;
        assert_eq!(app.average_of(id).await, "9.99");

        let res = app.post_empty(&routes::recompute(id)).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["restaurant_id"], id);
        assert_eq!(res.body["average_rating"], "4.50");
        assert_eq!(app.average_of(id).await, "4.50");
    }

    #[tokio::test]
    async fn recompute_one_of_missing_restaurant_is_404() {
        let app = TestApp::spawn().await;

        let res = app.post_empty(&routes::recompute(5555)).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn recompute_all_touches_active_restaurants_only() {
        let app = TestApp::spawn().await;
        let a = app.create_restaurant("Active One", "Pizza").await;
        let b = app.create_restaurant("Active Two", "Pizza").await;
        let gone = app.create_restaurant("Inactive", "Pizza").await;
        app.create_review(a, "ana", 2).await;
        app.delete(&routes::restaurant(gone)).await;
        for id in [a, b, gone] {
            app.overwrite_average(id, "9.99").await;
        }

        let res = app.post_empty(routes::RECOMPUTE_ALL).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["processed"], 2);
        assert_eq!(app.average_of(a).await, "2.00");
        assert_eq!(app.average_of(b).await, "0.00");
        assert_eq!(app.average_of(gone).await, "9.99");
    }

    #[tokio::test]
    async fn recompute_all_refreshes_cached_listing() {
        let app = TestApp::spawn().await;
        let id = app.create_restaurant("Cached Drift", "Other").await;
        app.overwrite_average(id, "9.99").await;

        let stale = app.get(routes::RESTAURANTS).await;
        assert_eq!(stale.body["items"][0]["average_rating"], "9.99");

        app.post_empty(routes::RECOMPUTE_ALL).await;

        let fresh = app.get(routes::RESTAURANTS).await;
        assert_eq!(fresh.body["items"][0]["average_rating"], "0.00");
    }
}

mod health {
    use super::*;

    #[tokio::test]
    async fn liveness_reports_ok() {
        let app = TestApp::spawn().await;

        let res = app.get(routes::HEALTH).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "ok");
        assert!(res.body["timestamp"].is_string());
        assert!(res.body["uptime_secs"].is_u64());
    }

    #[tokio::test]
    async fn database_probe_reports_ok() {
        let app = TestApp::spawn().await;

        let res = app.get(routes::HEALTH_DATABASE).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "healthy");
        assert!(res.body.get("error").is_none());
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let app = TestApp::spawn().await;

        let res = app.get("/api-docs/openapi.json").await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["info"]["title"], "TasteRank API");
        assert!(res.body["paths"]["/api/v1/reviews/{id}"].is_object());
    }
}
