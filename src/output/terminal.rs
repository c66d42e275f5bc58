// Colored terminal output for posts, comment threads, and blog stats.
//
// This module handles all terminal-specific formatting: colors and tables.
// The main.rs command handlers delegate here.

use colored::Colorize;

use crate::analytics::BlogStats;
use crate::db::models::{BlogSettings, EngagementCounts, Post};
use crate::engagement::{ThreadEntry, ViewOutcome};

/// Display posts as a table, newest first.
pub fn display_post_list(posts: &[Post]) {
    if posts.is_empty() {
        println!("No posts yet. Create one with `quantblog post create`.");
        return;
    }

    println!("\n{}", format!("=== Posts ({}) ===", posts.len()).bold());
    println!();
    println!(
        "  {:<36}  {:<40} {:>6} {:>6} {:>6}  {}",
        "Id".dimmed(),
        "Title".dimmed(),
        "Views".dimmed(),
        "Likes".dimmed(),
        "Shares".dimmed(),
        "Published".dimmed(),
    );
    println!("  {}", "-".repeat(118).dimmed());

    for post in posts {
        let title = super::truncate_chars(&post.title, 37);
        let title = if post.is_hidden {
            format!("{title} [ẩn]").dimmed().to_string()
        } else {
            title
        };
        println!(
            "  {:<36}  {:<40} {:>6} {:>6} {:>6}  {}",
            post.id,
            title,
            post.views,
            post.likes,
            post.shares,
            post.published_at.format("%Y-%m-%d"),
        );
    }
    println!();
}

/// Display one post with its metadata and full body.
pub fn display_post_detail(post: &Post) {
    println!("\n{}", format!("=== {} ===", post.title).bold());
    if post.is_hidden {
        println!("  {}", "Hidden from readers".yellow());
    }
    println!("  Id: {}", post.id);
    println!(
        "  By {} on {} ({} min read)",
        post.author,
        post.published_at.format("%Y-%m-%d %H:%M UTC"),
        post.read_time
    );
    if !post.tags.is_empty() {
        let tags: Vec<String> = post.tags.iter().map(|t| format!("#{t}")).collect();
        println!("  Tags: {}", tags.join(" ").cyan());
    }
    if let Some(image) = &post.image_url {
        println!("  Image: {}", image.dimmed());
    }
    display_counts(&EngagementCounts::from(post));
    println!("\n  {}", post.excerpt.italic());
    println!();
    for line in post.content.lines() {
        println!("  {line}");
    }
    println!();
}

/// Display a post's counters on one line.
pub fn display_counts(counts: &EngagementCounts) {
    println!(
        "  {} views  {} likes  {} shares",
        counts.views.to_string().bold(),
        counts.likes.to_string().red(),
        counts.shares.to_string().blue(),
    );
}

/// Describe the result of recording a view.
pub fn display_view_outcome(outcome: &ViewOutcome) {
    match outcome {
        ViewOutcome::Counted { views } => {
            println!("  {} View counted ({views} total)", "✓".green())
        }
        ViewOutcome::AlreadyCounted => {
            println!("  {} Already viewed today", "~".yellow())
        }
        ViewOutcome::Skipped => println!("  {} View not recorded", "!".red()),
    }
}

/// Display comment threads: top-level comments with indented replies.
pub fn display_threads(threads: &[ThreadEntry]) {
    if threads.is_empty() {
        println!("No comments yet.");
        return;
    }

    let total: usize = threads.iter().map(|t| 1 + t.replies.len()).sum();
    println!("\n{}", format!("=== Comments ({total}) ===").bold());
    for entry in threads {
        let c = &entry.comment;
        println!(
            "\n  {} {} {}",
            c.author_name.bold(),
            c.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
            format!("[{}]", c.id).dimmed()
        );
        println!("  {}", c.content);
        for reply in &entry.replies {
            println!(
                "      {} {} {} {}",
                "↳".dimmed(),
                reply.author_name.bold(),
                reply.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                format!("[{}]", reply.id).dimmed()
            );
            println!("        {}", reply.content);
        }
    }
    println!();
}

/// Display blog settings.
pub fn display_settings(settings: &BlogSettings) {
    println!("\n{}", format!("=== {} ===", settings.title).bold());
    println!("  {}", settings.description);
    if !settings.author_bio.is_empty() {
        println!("\n  {}", settings.author_bio.italic());
    }
    if !settings.topics.is_empty() {
        println!("\n  Topics: {}", settings.topics.join(", ").cyan());
    }
    let links = [
        ("Email", &settings.contact_email),
        ("GitHub", &settings.github_url),
        ("LinkedIn", &settings.linkedin_url),
        ("Facebook", &settings.facebook_url),
    ];
    for (label, value) in links {
        if let Some(value) = value {
            println!("  {label}: {value}");
        }
    }
    match settings.updated_at {
        Some(at) => println!("\n  {}", format!("Updated {}", at.format("%Y-%m-%d %H:%M UTC")).dimmed()),
        None => println!("\n  {}", "Using built-in defaults".dimmed()),
    }
    println!();
}

/// Display engagement totals and the most viewed posts.
pub fn display_stats(stats: &BlogStats) {
    println!(
        "Posts: {} total, {} hidden",
        stats.total_posts, stats.hidden_posts
    );
    println!(
        "Engagement: {} views, {} likes, {} shares",
        stats.total_views, stats.total_likes, stats.total_shares
    );

    if stats.top_posts.is_empty() {
        return;
    }
    println!("Most read:");
    for (i, post) in stats.top_posts.iter().enumerate() {
        println!(
            "  {}. {} {}",
            i + 1,
            super::truncate_chars(&post.title, 60),
            format!("({} views, {} likes)", post.views, post.likes).dimmed()
        );
    }
}
