//! List / search commands.
//!
//! `kubedeck users search -w name:like:prod --page 2 --size 20`

use anyhow::{Context, Result};
use clap::Args;

use identity::IdentityService;
use kubedeck_store::{Condition, Operator, QueryWindow};

use super::print_json;

/// Filter and window flags shared by every search command.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Condition as `field:operator:value`, e.g. `nickName:like:ann`. Repeatable.
    #[arg(short = 'w', long = "where")]
    pub conditions: Vec<String>,

    /// Free-text search over the resource's quick fields.
    #[arg(short = 'q', long = "quick")]
    pub quick: Option<String>,

    /// 1-based page number.
    #[arg(long = "page", default_value_t = 1)]
    pub page: usize,

    /// Page size. 0 returns every match.
    #[arg(long = "size", default_value_t = 20)]
    pub size: usize,
}

impl SearchArgs {
    pub fn conditions(&self) -> Result<Vec<Condition>> {
        let mut conditions = self
            .conditions
            .iter()
            .map(|raw| parse_condition(raw))
            .collect::<Result<Vec<_>>>()?;
        if let Some(text) = &self.quick {
            conditions.push(Condition::quick(text.clone()));
        }
        Ok(conditions)
    }

    pub fn window(&self) -> QueryWindow {
        QueryWindow::new(self.page, self.size)
    }
}

/// Parse `field:operator:value`. The value may itself contain `:`.
pub fn parse_condition(raw: &str) -> Result<Condition> {
    let mut parts = raw.splitn(3, ':');
    let (field, operator, value) = match (parts.next(), parts.next(), parts.next()) {
        (Some(f), Some(o), Some(v)) if !f.trim().is_empty() => (f.trim(), o.trim(), v),
        _ => anyhow::bail!("Invalid condition \"{}\": expected field:operator:value", raw),
    };
    let operator: Operator = operator
        .parse()
        .with_context(|| format!("Invalid condition \"{}\"", raw))?;
    Ok(Condition::new(field, operator, value))
}

pub fn users(svc: &IdentityService, args: &SearchArgs) -> Result<()> {
    let page = svc.search_users(&args.conditions()?, args.window())?;
    print_json(&page)
}

pub fn role_bindings(svc: &IdentityService, args: &SearchArgs) -> Result<()> {
    let page = svc.search_role_bindings(&args.conditions()?, args.window())?;
    print_json(&page)
}

pub fn operation_logs(svc: &IdentityService, args: &SearchArgs) -> Result<()> {
    let page = svc.search_operation_logs(&args.conditions()?, args.window())?;
    print_json(&page)
}

pub fn login_logs(svc: &IdentityService, args: &SearchArgs) -> Result<()> {
    let page = svc.search_login_logs(&args.conditions()?, args.window())?;
    print_json(&page)
}

pub fn image_repos(svc: &IdentityService, args: &SearchArgs) -> Result<()> {
    let page = svc
        .search_image_repos(&args.conditions()?, args.window())?
        .map(|repo| repo.redacted());
    print_json(&page)
}
