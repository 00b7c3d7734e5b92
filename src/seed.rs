//! Demo data seeder: a small staffed helpdesk with a backlog of tickets.
//! Invoked through the CLI; a no-op when accounts already exist.

use anyhow::Context;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::roles;
use crate::models::user::RoleTag;
use crate::utils::{hash_password, utc_now};

const DEMO_PASSWORD: &str = "Pa$w0rd!";

pub async fn seed_demo(pool: &SqlitePool) -> anyhow::Result<()> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM accounts")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        tracing::info!("accounts already present, skipping demo seed");
        return Ok(());
    }

    create_account(pool, "Amara", "Okafor", "admin@helpdesk.test", RoleTag::Admin).await?;

    let agent_specs = [
        ("Jonas", "Lindqvist", "jonas@helpdesk.test", "networking, vpn", "weekdays"),
        ("Priya", "Raman", "priya@helpdesk.test", "billing, refunds", "weekdays"),
        ("Tomasz", "Kowalski", "tomasz@helpdesk.test", "hardware, peripherals", "weekends"),
        ("Leila", "Haddad", "leila@helpdesk.test", "accounts, onboarding", "weekdays"),
    ];

    let mut agent_ids = Vec::new();
    for (first, last, email, skillset, availability) in agent_specs {
        let account_id = create_account(pool, first, last, email, RoleTag::Agent).await?;
        let result = sqlx::query(
            "INSERT INTO agents (account_id, agent_name, skillset, availability) VALUES (?, ?, ?, ?)",
        )
        .bind(account_id.to_string())
        .bind(format!("{first} {last}"))
        .bind(skillset)
        .bind(availability)
        .execute(pool)
        .await?;
        agent_ids.push(result.last_insert_rowid());
    }

    let customer_specs = [
        ("Maya", "Chen", "maya@example.com", "+1-555-0101"),
        ("Derek", "Osei", "derek@example.com", "+1-555-0102"),
        ("Ingrid", "Svensson", "ingrid@example.com", "+46-70-5550103"),
        ("Rafael", "Moreno", "rafael@example.com", "+34-600-555104"),
        ("Yuki", "Tanaka", "yuki@example.com", "+81-90-5550105"),
    ];

    let mut customer_ids = Vec::new();
    for (first, last, email, phone) in customer_specs {
        let account_id = create_account(pool, first, last, email, RoleTag::Customer).await?;
        let result = sqlx::query(
            "INSERT INTO customers (account_id, customer_name, phone) VALUES (?, ?, ?)",
        )
        .bind(account_id.to_string())
        .bind(format!("{first} {last}"))
        .bind(phone)
        .execute(pool)
        .await?;
        customer_ids.push(result.last_insert_rowid());
    }

    // (subject, description, customer idx, assigned agent idx, department, priority, status)
    let ticket_specs: [(&str, &str, usize, Option<usize>, &str, &str, &str); 12] = [
        ("VPN drops every hour", "Connection resets roughly on the hour.", 0, Some(0), "Technical", "High", "In Progress"),
        ("Invoice charged twice", "March invoice appears twice on my card.", 1, Some(1), "Billing", "Critical", "Open"),
        ("Cannot reset password", "Reset email never arrives.", 2, Some(3), "Support", "Medium", "Open"),
        ("Printer driver crash", "Driver crashes on large PDF jobs.", 3, Some(2), "Technical", "Low", "On Hold"),
        ("Upgrade to team plan", "Want to move 12 seats to the team plan.", 4, Some(1), "Sales", "Medium", "Open"),
        ("Dark mode request", "Please add a dark theme to the portal.", 0, None, "Feature Requests", "Low", "Open"),
        ("Login loop on mobile", "App bounces back to the login screen.", 1, Some(0), "Technical", "High", "In Progress"),
        ("Refund not received", "Refund approved two weeks ago, nothing yet.", 2, Some(1), "Billing", "High", "Open"),
        ("Keyboard shortcuts", "Would love keyboard navigation in lists.", 3, None, "Feature Requests", "Low", "Open"),
        ("Onboarding webinar", "Need a session for our new hires.", 4, Some(3), "Support", "Medium", "Resolved"),
        ("Broken export to CSV", "Export yields an empty file since Friday.", 0, Some(2), "Technical", "Critical", "Open"),
        ("Cancel old subscription", "Legacy plan still billing after upgrade.", 1, Some(1), "Billing", "Medium", "Closed"),
    ];

    for (subject, description, customer_idx, agent_idx, department, priority, status) in ticket_specs {
        let now = utc_now();
        let result = sqlx::query(
            r#"
            INSERT INTO tickets (customer_id, subject, description, status_id, priority_id, assigned_to, department_id, created_at, updated_at)
            VALUES (?, ?, ?,
                    (SELECT id FROM ticket_status WHERE status_name = ?),
                    (SELECT id FROM ticket_priority WHERE priority_name = ?),
                    ?,
                    (SELECT id FROM departments WHERE department_name = ?),
                    ?, ?)
            "#,
        )
        .bind(customer_ids[customer_idx])
        .bind(subject)
        .bind(description)
        .bind(status)
        .bind(priority)
        .bind(agent_idx.map(|idx| agent_ids[idx]))
        .bind(department)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        let ticket_id = result.last_insert_rowid();

        let comment_result = sqlx::query(
            "INSERT INTO ticket_comments (ticket_id, author_role, message, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(ticket_id)
        .bind(RoleTag::Customer.as_str())
        .bind(description)
        .bind(now)
        .execute(pool)
        .await?;

        if agent_idx.is_some() {
            sqlx::query(
                "INSERT INTO ticket_comments (ticket_id, author_role, parent_comment_id, message, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(ticket_id)
            .bind(RoleTag::Agent.as_str())
            .bind(comment_result.last_insert_rowid())
            .bind("Thanks for the report, looking into it now.")
            .bind(now)
            .execute(pool)
            .await?;
        }

        // One sample attachment on the opening comment of every third ticket.
        if ticket_id % 3 == 0 {
            sqlx::query(
                "INSERT INTO ticket_attachments (comment_id, file_name, file_path, uploaded_at) VALUES (?, ?, ?, ?)",
            )
            .bind(comment_result.last_insert_rowid())
            .bind("screenshot.png")
            .bind(format!("/uploads/tickets/{ticket_id}/screenshot.png"))
            .bind(now)
            .execute(pool)
            .await?;
        }
    }

    tracing::info!(
        agents = agent_ids.len(),
        customers = customer_ids.len(),
        "demo data seeded"
    );

    Ok(())
}

async fn create_account(
    pool: &SqlitePool,
    first_name: &str,
    last_name: &str,
    email: &str,
    role: RoleTag,
) -> anyhow::Result<Uuid> {
    let account_id = Uuid::new_v4();
    let now = utc_now();
    let password_hash = hash_password(DEMO_PASSWORD).context("failed to hash demo password")?;

    sqlx::query(
        "INSERT INTO accounts (id, first_name, last_name, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(account_id.to_string())
    .bind(first_name)
    .bind(last_name)
    .bind(email)
    .bind(password_hash)
    .bind(role.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let role_slug = match role {
        RoleTag::Admin => roles::ADMIN,
        RoleTag::Agent => roles::AGENT,
        RoleTag::Customer => roles::CUSTOMER,
    };

    sqlx::query("INSERT INTO accounts_roles (account_id, role_id) SELECT ?, id FROM roles WHERE slug = ?")
        .bind(account_id.to_string())
        .bind(role_slug)
        .execute(pool)
        .await?;

    Ok(account_id)
}
