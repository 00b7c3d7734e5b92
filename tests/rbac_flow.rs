//! RBAC administration and the no-stale-grants guarantee: role and
//! permission changes bind on the very next request.

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn rbac_endpoints_are_admin_only() -> Result<()> {
    let (app, pool, _dir) = common::setup().await?;

    let (customer_token, _) = common::register_customer(&app, "Maya", "Chen", "maya@example.com").await?;
    let agent = common::create_staff(&pool, &app, "Agent", "jonas@helpdesk.test").await?;

    for token in [&customer_token, &agent.token] {
        let (status, _) = common::request(&app, "GET", "/rbac/roles", Some(token), None).await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    let admin = common::create_staff(&pool, &app, "Admin", "admin@helpdesk.test").await?;
    let (status, roles) = common::request(&app, "GET", "/rbac/roles", Some(&admin.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roles.as_array().unwrap().len(), 3);

    Ok(())
}

#[tokio::test]
async fn revoked_permission_binds_on_the_next_request() -> Result<()> {
    let (app, pool, _dir) = common::setup().await?;

    let admin = common::create_staff(&pool, &app, "Admin", "admin@helpdesk.test").await?;
    let agent = common::create_staff(&pool, &app, "Agent", "jonas@helpdesk.test").await?;
    let (maya_token, _) = common::register_customer(&app, "Maya", "Chen", "maya@example.com").await?;

    let ticket_id = common::create_ticket(&app, &maya_token, "Refund not received").await?;

    // With view_all_tickets the agent can open anyone's ticket.
    let (status, _) = common::request(
        &app,
        "GET",
        &format!("/tickets/{ticket_id}"),
        Some(&agent.token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = common::request(
        &app,
        "DELETE",
        &format!(
            "/rbac/roles/{}/permissions/{}",
            common::AGENT_ROLE_ID,
            common::VIEW_ALL_TICKETS_ID
        ),
        Some(&admin.token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Same token, next request: the ticket is gone from the agent's view.
    let (status, _) = common::request(
        &app,
        "GET",
        &format!("/tickets/{ticket_id}"),
        Some(&agent.token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, effective) = common::request(
        &app,
        "GET",
        &format!("/rbac/users/{}/effective-permissions", agent.account_id),
        Some(&admin.token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(effective["roles"].as_array().unwrap().iter().any(|r| r == "agent"));
    assert!(!effective["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p["slug"] == "view_all_tickets"));

    Ok(())
}

#[tokio::test]
async fn granted_role_binds_on_the_next_request() -> Result<()> {
    let (app, pool, _dir) = common::setup().await?;

    let admin = common::create_staff(&pool, &app, "Admin", "admin@helpdesk.test").await?;
    let (maya_token, _) = common::register_customer(&app, "Maya", "Chen", "maya@example.com").await?;
    let (derek_token, derek_id) = common::register_customer(&app, "Derek", "Osei", "derek@example.com").await?;

    let maya_ticket = common::create_ticket(&app, &maya_token, "Upgrade to team plan").await?;

    let (status, _) = common::request(
        &app,
        "GET",
        &format!("/tickets/{maya_ticket}"),
        Some(&derek_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Granting the agent role carries view_all_tickets with it.
    let (status, _) = common::request(
        &app,
        "POST",
        &format!("/rbac/users/{derek_id}/roles"),
        Some(&admin.token),
        Some(json!({ "role_id": common::AGENT_ROLE_ID })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = common::request(
        &app,
        "GET",
        &format!("/tickets/{maya_ticket}"),
        Some(&derek_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    // Revoking it closes the window again.
    let (status, _) = common::request(
        &app,
        "DELETE",
        &format!("/rbac/users/{derek_id}/roles/{}", common::AGENT_ROLE_ID),
        Some(&admin.token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = common::request(
        &app,
        "GET",
        &format!("/tickets/{maya_ticket}"),
        Some(&derek_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn custom_role_lifecycle() -> Result<()> {
    let (app, pool, _dir) = common::setup().await?;

    let admin = common::create_staff(&pool, &app, "Admin", "admin@helpdesk.test").await?;
    let (_, derek_id) = common::register_customer(&app, "Derek", "Osei", "derek@example.com").await?;

    let (status, role) = common::request(
        &app,
        "POST",
        "/rbac/roles",
        Some(&admin.token),
        Some(json!({
            "name": "Supervisor",
            "slug": "supervisor",
            "description": "Reviews escalated tickets",
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let role_id = role["id"].as_str().unwrap().to_string();

    // Duplicate slugs conflict.
    let (status, _) = common::request(
        &app,
        "POST",
        "/rbac/roles",
        Some(&admin.token),
        Some(json!({ "name": "Supervisor Two", "slug": "supervisor" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = common::request(
        &app,
        "POST",
        &format!("/rbac/roles/{role_id}/permissions"),
        Some(&admin.token),
        Some(json!({ "permission_id": common::VIEW_ALL_TICKETS_ID })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = common::request(
        &app,
        "POST",
        &format!("/rbac/users/{derek_id}/roles"),
        Some(&admin.token),
        Some(json!({ "role_id": role_id })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, effective) = common::request(
        &app,
        "GET",
        &format!("/rbac/users/{derek_id}/effective-permissions"),
        Some(&admin.token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(effective["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p["slug"] == "view_all_tickets" && p["role_slug"] == "supervisor"));

    // Deleting the role cascades its grants away.
    let (status, _) = common::request(
        &app,
        "DELETE",
        &format!("/rbac/roles/{role_id}"),
        Some(&admin.token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, effective) = common::request(
        &app,
        "GET",
        &format!("/rbac/users/{derek_id}/effective-permissions"),
        Some(&admin.token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(!effective["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p["slug"] == "view_all_tickets"));

    Ok(())
}

#[tokio::test]
async fn unknown_references_are_not_found() -> Result<()> {
    let (app, pool, _dir) = common::setup().await?;

    let admin = common::create_staff(&pool, &app, "Admin", "admin@helpdesk.test").await?;

    let missing = uuid::Uuid::new_v4();

    let (status, _) = common::request(
        &app,
        "GET",
        &format!("/rbac/roles/{missing}"),
        Some(&admin.token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = common::request(
        &app,
        "POST",
        &format!("/rbac/users/{missing}/roles"),
        Some(&admin.token),
        Some(json!({ "role_id": common::AGENT_ROLE_ID })),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}
