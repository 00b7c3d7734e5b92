use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn full_customer_flow() -> Result<()> {
    let (app, _pool, _dir) = common::setup().await?;

    let (token, _account_id) = common::register_customer(&app, "Maya", "Chen", "maya@example.com").await?;

    // Registering the same email again conflicts.
    let (status, _) = common::request(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "first_name": "Maya",
            "last_name": "Chen",
            "email": "maya@example.com",
            "password": common::TEST_PASSWORD,
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // Wrong password is rejected.
    let (status, _) = common::request(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "maya@example.com", "password": "wrong-password" })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // /auth/me reflects the seeded customer role and its permission union.
    let (status, me) = common::request(&app, "GET", "/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["role"], "Customer");
    assert!(me["roles"].as_array().unwrap().iter().any(|r| r == "customer"));
    let permissions = me["permissions"].as_array().unwrap();
    assert!(permissions.iter().any(|p| p == "create_tickets"));
    assert!(permissions.iter().any(|p| p == "comment_tickets"));
    assert!(!permissions.iter().any(|p| p == "view_all_tickets"));

    // Seeded lookups are readable by any authenticated account.
    let (status, departments) = common::request(&app, "GET", "/departments", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(departments.as_array().unwrap().len(), 5);

    // File a ticket; the opening message becomes the first comment.
    let (status, detail) = common::request(
        &app,
        "POST",
        "/tickets",
        Some(&token),
        Some(json!({
            "subject": "Cannot login to account",
            "description": "Forgot password link not working",
            "department_id": 1,
            "priority_id": 2,
            "message": "I am unable to login with my credentials.",
            "attachments": [{ "file_name": "screenshot.png", "file_path": "/uploads/screenshot.png" }],
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "ticket create failed: {detail}");
    let ticket_id = detail["id"].as_i64().unwrap();
    assert_eq!(detail["comments"].as_array().unwrap().len(), 1);
    assert_eq!(detail["comments"][0]["author_role"], "Customer");
    assert_eq!(detail["comments"][0]["attachments"].as_array().unwrap().len(), 1);

    let (status, tickets) = common::request(&app, "GET", "/tickets", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tickets.as_array().unwrap().len(), 1);
    assert_eq!(tickets[0]["status_name"], "Open");

    // Reply on the own ticket.
    let (status, comment) = common::request(
        &app,
        "POST",
        &format!("/tickets/{ticket_id}/comments"),
        Some(&token),
        Some(json!({ "message": "Still getting the error." })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["ticket_id"].as_i64(), Some(ticket_id));

    let (status, detail) = common::request(&app, "GET", &format!("/tickets/{ticket_id}"), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["comments"].as_array().unwrap().len(), 2);

    // Attachment metadata is reachable for the owner.
    let attachment_id = detail["comments"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|c| c["attachments"].as_array().unwrap())
        .next()
        .and_then(|a| a["id"].as_i64())
        .unwrap();
    let (status, attachment) = common::request(
        &app,
        "GET",
        &format!("/tickets/{ticket_id}/attachments/{attachment_id}"),
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(attachment["file_name"], "screenshot.png");

    // Customers hold none of the manage_* permissions.
    let (status, _) = common::request(
        &app,
        "POST",
        "/departments",
        Some(&token),
        Some(json!({ "department_name": "Escalations" })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = common::request(&app, "POST", "/auth/logout", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn extreme_page_numbers_yield_an_empty_page() -> Result<()> {
    let (app, _pool, _dir) = common::setup().await?;

    let (token, _) = common::register_customer(&app, "Maya", "Chen", "maya@example.com").await?;
    common::create_ticket(&app, &token, "VPN drops every hour").await?;

    // The largest representable page must page past the data, not error out.
    let (status, tickets) = common::request(
        &app,
        "GET",
        "/tickets?page=4294967295&per_page=100",
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(tickets.as_array().unwrap().is_empty());

    let (status, tickets) = common::request(&app, "GET", "/tickets?page=1&per_page=100", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tickets.as_array().unwrap().len(), 1);

    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_token() -> Result<()> {
    let (app, _pool, _dir) = common::setup().await?;

    for uri in ["/tickets", "/auth/me", "/departments", "/rbac/roles"] {
        let (status, _) = common::request(&app, "GET", uri, None, None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "expected 401 for {uri}");
    }

    let (status, _) = common::request(&app, "GET", "/tickets", Some("not-a-jwt"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn staff_can_manage_lookups_and_directory() -> Result<()> {
    let (app, pool, _dir) = common::setup().await?;

    let admin = common::create_staff(&pool, &app, "Admin", "admin@helpdesk.test").await?;
    common::create_staff(&pool, &app, "Agent", "agent@helpdesk.test").await?;
    common::register_customer(&app, "Derek", "Osei", "derek@example.com").await?;

    let (status, created) = common::request(
        &app,
        "POST",
        "/departments",
        Some(&admin.token),
        Some(json!({ "department_name": "Escalations" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let department_id = created["id"].as_i64().unwrap();

    // Duplicate names conflict.
    let (status, _) = common::request(
        &app,
        "POST",
        "/departments",
        Some(&admin.token),
        Some(json!({ "department_name": "Escalations" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = common::request(
        &app,
        "DELETE",
        &format!("/departments/{department_id}"),
        Some(&admin.token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, users) = common::request(&app, "GET", "/users", Some(&admin.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 3);

    let (status, agents) = common::request(&app, "GET", "/agents", Some(&admin.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agents.as_array().unwrap().len(), 1);

    let (status, customers) = common::request(&app, "GET", "/customers", Some(&admin.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(customers.as_array().unwrap().len(), 1);

    Ok(())
}
