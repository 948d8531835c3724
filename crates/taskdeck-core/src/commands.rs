use std::collections::BTreeSet;
use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use tracing::{error, info, instrument, warn};

use crate::account::{self, AccountError, PasswordCheck};
use crate::cli::{AddArgs, Command, EditArgs, ListArgs, TaskFieldArgs};
use crate::datetime::parse_date_expr;
use crate::draft::TaskDraft;
use crate::error::ClientError;
use crate::gateway::{AccountGateway, TaskGateway};
use crate::render::{Renderer, TASK_NOT_FOUND};
use crate::session::Session;
use crate::sort::{SortConfig, SortDirection, SortKey};
use crate::task::{Attachment, Priority, Status, SubtaskStatus};
use crate::view::TaskListView;

/// Everything a command needs besides its arguments.
pub struct CommandContext<G> {
    pub gateway: G,
    pub session: Session,
    pub renderer: Renderer,
    pub default_sort: SortConfig,
    pub today: NaiveDate,
}

#[instrument(skip_all)]
pub async fn dispatch<G, R, W>(
    ctx: &mut CommandContext<G>,
    command: Command,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<()>
where
    G: TaskGateway + AccountGateway,
    R: BufRead,
    W: Write,
{
    match command {
        Command::Signup { username, password } => {
            let password = password_or_prompt(password, input, out)?;
            cmd_signup(ctx, &username, &password, out).await
        }
        Command::Login { username, password } => {
            let password = password_or_prompt(password, input, out)?;
            cmd_login(ctx, &username, &password, out).await
        }
        Command::Logout => {
            account::logout(&mut ctx.session)?;
            writeln!(out, "Signed out.")?;
            Ok(())
        }
        Command::Whoami => cmd_whoami(ctx, out).await,
        Command::List(args) => cmd_list(ctx, &args, out).await,
        Command::Show { id } => cmd_show(ctx, id, out).await,
        Command::Add(args) => cmd_add(ctx, args, out).await,
        Command::Edit(args) => cmd_edit(ctx, args, out).await,
        Command::Delete { ids, yes } => cmd_delete(ctx, &ids, yes, input, out).await,
    }
}

/// Convert a gateway error into the user-facing error. A rejected token
/// clears the session.
fn gateway_failure(session: &mut Session, action: &str, err: ClientError) -> anyhow::Error {
    error!(action, error = %err, "gateway call failed");
    match err {
        ClientError::MissingToken => anyhow!(err),
        ClientError::Unauthorized { .. } => {
            if session.is_signed_in()
                && let Err(teardown_err) = session.teardown()
            {
                warn!(error = %teardown_err, "failed clearing session");
            }
            anyhow!(err).context("session expired; run `taskdeck login` again")
        }
        _ => anyhow!(err).context(format!("failed to {action}")),
    }
}

fn password_or_prompt<R: BufRead, W: Write>(
    password: Option<String>,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    write!(out, "Password: ")?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line).context("failed reading password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[instrument(skip(ctx, password, out))]
async fn cmd_signup<G: AccountGateway, W: Write>(
    ctx: &mut CommandContext<G>,
    username: &str,
    password: &str,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command signup");
    ctx.renderer
        .write_password_check(out, &PasswordCheck::evaluate(username.trim(), password))?;

    match account::signup(&ctx.gateway, username, password).await {
        Ok(_) => {
            writeln!(out, "Account created. Run `taskdeck login {}` to sign in.", username.trim())?;
            Ok(())
        }
        Err(AccountError::Client(err)) => Err(gateway_failure(&mut ctx.session, "sign up", err)),
        Err(err) => Err(err.into()),
    }
}

#[instrument(skip(ctx, password, out))]
async fn cmd_login<G: AccountGateway, W: Write>(
    ctx: &mut CommandContext<G>,
    username: &str,
    password: &str,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command login");
    match account::login(&ctx.gateway, &mut ctx.session, username, password).await {
        Ok(()) => {
            let name = ctx.session.username().unwrap_or(username);
            writeln!(out, "Signed in as {name}.")?;
            Ok(())
        }
        Err(AccountError::Client(err)) => {
            error!(error = %err, "login failed");
            Err(anyhow!(err).context("failed to log in"))
        }
        Err(err) => Err(err.into()),
    }
}

#[instrument(skip_all)]
async fn cmd_whoami<G: AccountGateway, W: Write>(ctx: &mut CommandContext<G>, out: &mut W) -> anyhow::Result<()> {
    info!("command whoami");
    match account::refresh_current_user(&ctx.gateway, &mut ctx.session).await {
        Ok(user) => {
            writeln!(out, "{}", user.username)?;
            Ok(())
        }
        Err(err) if err.is_auth() => Err(anyhow!(err).context("not signed in")),
        Err(err) => Err(anyhow!(err).context("failed to fetch current user")),
    }
}

fn sort_from_args(default: SortConfig, args: &ListArgs) -> anyhow::Result<SortConfig> {
    let key = match &args.sort {
        Some(raw) => raw.parse::<SortKey>()?,
        None => default.key,
    };
    let direction = if args.desc {
        SortDirection::Desc
    } else if args.sort.is_some() {
        SortDirection::Asc
    } else {
        default.direction
    };
    Ok(SortConfig::new(key, direction))
}

#[instrument(skip(ctx, out))]
async fn cmd_list<G: TaskGateway, W: Write>(
    ctx: &mut CommandContext<G>,
    args: &ListArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command list");
    let mut view = TaskListView::new(sort_from_args(ctx.default_sort, args)?);

    let filter = view.filter_mut();
    filter.add_priority_terms(&args.priorities)?;
    filter.add_status_terms(&args.statuses)?;
    if args.all_priorities {
        filter.select_all_priorities();
    }
    if args.all_statuses {
        filter.select_all_statuses();
    }

    view.load(&ctx.gateway, &mut ctx.session)
        .await
        .map_err(|err| gateway_failure(&mut ctx.session, "load tasks", err))?;

    if args.expand_all {
        view.expand_all();
    }
    for id in args.expand.iter().collect::<BTreeSet<_>>() {
        if !view.expansion().is_expanded(*id) {
            view.toggle_expanded(*id);
        }
    }

    ctx.renderer.write_task_table(out, &view.rows())
}

#[instrument(skip(ctx, out))]
async fn cmd_show<G: TaskGateway, W: Write>(ctx: &mut CommandContext<G>, id: u64, out: &mut W) -> anyhow::Result<()> {
    info!("command show");
    let token = ctx.session.require_token()?.to_string();
    match ctx.gateway.get_task(id, &token).await {
        Ok(task) => ctx.renderer.write_task_details(out, &task),
        Err(err) if err.is_not_found() => {
            warn!(id, "task not found");
            writeln!(out, "{TASK_NOT_FOUND}")?;
            Ok(())
        }
        Err(err) => Err(gateway_failure(&mut ctx.session, "load task", err)),
    }
}

fn apply_fields(draft: &mut TaskDraft, fields: &TaskFieldArgs, today: NaiveDate) -> anyhow::Result<()> {
    if let Some(title) = &fields.title {
        draft.title = title.clone();
    }
    if let Some(due) = &fields.due {
        draft.due_date = Some(parse_date_expr(due, today).context("invalid --due")?);
    }
    if let Some(raw) = &fields.priority {
        draft.priority =
            Priority::parse_known(raw).ok_or_else(|| anyhow!("unknown priority: {raw} (expected low, high or critical)"))?;
    }
    if let Some(raw) = &fields.status {
        draft.status = Status::parse(raw)
            .ok_or_else(|| anyhow!("unknown status: {raw} (expected not started, in progress, complete or cancelled)"))?;
    }
    if let Some(details) = &fields.details {
        draft.details = details.clone();
    }
    if let Some(created) = &fields.created {
        draft.date_created = parse_date_expr(created, today).context("invalid --created")?;
    }
    for path in &fields.attach {
        draft.add_attachment(attachment_from_path(path)?)?;
    }
    Ok(())
}

/// Attachment metadata for a local file; the content type comes from the
/// extension.
pub fn attachment_from_path(path: &Path) -> anyhow::Result<Attachment> {
    let meta = fs::metadata(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("not a file: {}", path.display()))?;
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let content_type = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    };
    Ok(Attachment {
        name,
        size_bytes: meta.len(),
        content_type: content_type.to_string(),
    })
}

#[instrument(skip(ctx, args, out))]
async fn cmd_add<G: TaskGateway, W: Write>(
    ctx: &mut CommandContext<G>,
    args: AddArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command add");
    let mut draft = TaskDraft::new(ctx.today);
    apply_fields(&mut draft, &args.fields, ctx.today)?;
    for title in &args.subtasks {
        let id = draft.add_subtask();
        draft.rename_subtask(id, title.as_str())?;
    }
    let input = draft.into_input(ctx.today)?;

    let token = ctx.session.require_token()?.to_string();
    let created = ctx
        .gateway
        .create_task(&input, &token)
        .await
        .map_err(|err| gateway_failure(&mut ctx.session, "create task", err))?;

    info!(id = created.id, "task created");
    writeln!(out, "Created task {}.", created.id)?;
    Ok(())
}

#[instrument(skip(ctx, args, out), fields(id = args.id))]
async fn cmd_edit<G: TaskGateway, W: Write>(
    ctx: &mut CommandContext<G>,
    args: EditArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command edit");
    let token = ctx.session.require_token()?.to_string();
    let existing = match ctx.gateway.get_task(args.id, &token).await {
        Ok(task) => task,
        Err(err) if err.is_not_found() => {
            writeln!(out, "{TASK_NOT_FOUND}")?;
            return Ok(());
        }
        Err(err) => return Err(gateway_failure(&mut ctx.session, "load task", err)),
    };

    let mut draft = TaskDraft::from_task(&existing);
    apply_fields(&mut draft, &args.fields, ctx.today)?;
    for name in &args.detach {
        draft.remove_attachment(name)?;
    }
    for id in &args.remove_subtasks {
        draft.remove_subtask(*id)?;
    }
    for change in &args.subtask_statuses {
        let status = SubtaskStatus::parse(&change.status).ok_or_else(|| {
            anyhow!(
                "unknown subtask status: {} (expected not started, in progress or complete)",
                change.status
            )
        })?;
        draft.set_subtask_status(change.id, status)?;
    }
    for title in &args.add_subtasks {
        let id = draft.add_subtask();
        draft.rename_subtask(id, title.as_str())?;
    }

    let task = draft.into_input(ctx.today)?.into_task(existing.id);
    let updated = ctx
        .gateway
        .update_task(&task, &token)
        .await
        .map_err(|err| gateway_failure(&mut ctx.session, "update task", err))?;

    writeln!(out, "Updated task {}.", updated.id)?;
    ctx.renderer.write_task_details(out, &updated)
}

#[instrument(skip(ctx, input, out))]
async fn cmd_delete<G: TaskGateway, R: BufRead, W: Write>(
    ctx: &mut CommandContext<G>,
    ids: &[u64],
    yes: bool,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command delete");
    let mut view = TaskListView::new(ctx.default_sort);
    view.load(&ctx.gateway, &mut ctx.session)
        .await
        .map_err(|err| gateway_failure(&mut ctx.session, "load tasks", err))?;

    for id in ids.iter().collect::<BTreeSet<_>>() {
        if !view.store().contains(*id) {
            warn!(id, "selected id is not in the task list");
        }
        view.toggle_selected(*id);
    }

    let count = view.request_delete()?.len();
    writeln!(out, "{count} task(s) will be deleted.")?;

    if !yes && !confirm(input, out)? {
        view.cancel_delete()?;
        writeln!(out, "Deletion cancelled.")?;
        return Ok(());
    }

    let report = view.confirm_delete(&ctx.gateway, &ctx.session).await?;
    if report.auth_rejected() {
        warn!("token rejected during deletion; clearing session");
        ctx.session.teardown()?;
    }
    ctx.renderer.write_deletion_report(out, &report)?;
    Ok(())
}

fn confirm<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> anyhow::Result<bool> {
    write!(out, "Continue? [y/N] ")?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line).context("failed reading confirmation")?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
