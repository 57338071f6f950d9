use std::io::Read as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::backfill::ensure_ids;
use crate::cli::{ApplyArgs, CheckArgs, IdsArgs, LocateArgs, RenderArgs};
use crate::config::EngineConfig;
use crate::locate::locate;
use crate::mutate::Mutator;
use crate::outline::{IntroExcerpt, sync_with};
use crate::render::{fingerprint, render};
use crate::request::EditRequest;
use crate::store;
use crate::validate::check as check_notebook;

pub fn render_notebook(args: RenderArgs) -> anyhow::Result<()> {
    let notebook = store::load(Path::new(&args.notebook))?;
    let text = render(&notebook, args.tagged);

    match args.out {
        Some(out) => {
            let out = PathBuf::from(out);
            std::fs::write(&out, text)
                .with_context(|| format!("write rendering: {}", out.display()))?;
        }
        None => print!("{text}"),
    }
    Ok(())
}

pub fn ids(args: IdsArgs) -> anyhow::Result<()> {
    let config = EngineConfig::from_env().context("load engine config")?;
    let path = PathBuf::from(&args.notebook);
    let mut notebook = store::load(&path)?;

    let backfilled = ensure_ids(&mut notebook);
    let report = sync_with(&mut notebook, &IntroExcerpt::new(&config));

    let out = args.out.map(PathBuf::from).unwrap_or(path);
    store::save(&out, &notebook)?;
    tracing::info!(backfilled, path = %out.display(), "assigned ids");

    let summary = serde_json::json!({
        "backfilled": backfilled,
        "renamed": report.renamed,
        "added": report.added,
        "removed": report.removed,
        "fingerprint": fingerprint(&notebook),
    });
    println!("{summary}");
    Ok(())
}

pub fn locate_id(args: LocateArgs) -> anyhow::Result<()> {
    let notebook = store::load(Path::new(&args.notebook))?;
    let Some(found) = locate(&notebook, &args.id) else {
        anyhow::bail!("no node or field has id `{}`", args.id);
    };

    let summary = serde_json::json!({
        "id": args.id,
        "kind": found.kind(),
        "field": found.field,
        "node_id": found.node.id(),
        "path": found.path.to_string(),
    });
    println!("{summary}");
    Ok(())
}

pub fn apply(args: ApplyArgs) -> anyhow::Result<()> {
    let config = EngineConfig::from_env().context("load engine config")?;
    let path = PathBuf::from(&args.notebook);
    let mut notebook = store::load(&path)?;

    let raw = read_request(&args.request)?;
    let request: EditRequest = serde_json::from_str(&raw).context("parse edit request")?;
    let op = request.into_op().context("check edit request")?;

    let mutator = Mutator::new(&config);
    let outcome = match args.expect_fingerprint.as_deref() {
        Some(expected) => mutator.apply_if_fingerprint(&mut notebook, op, expected),
        None => mutator.apply(&mut notebook, op),
    }
    .context("apply edit")?;

    let out = args.out.map(PathBuf::from).unwrap_or(path);
    store::save(&out, &notebook)?;

    let summary = serde_json::json!({
        "created_id": outcome.created_id,
        "fingerprint": outcome.fingerprint,
        "backfilled": outcome.backfilled,
    });
    println!("{summary}");
    Ok(())
}

fn read_request(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("read edit request from stdin")?;
        return Ok(raw);
    }
    std::fs::read_to_string(source).with_context(|| format!("read edit request: {source}"))
}

pub fn check(args: CheckArgs) -> anyhow::Result<()> {
    let notebook = store::load(Path::new(&args.notebook))?;
    let issues = check_notebook(&notebook);
    for issue in &issues {
        println!("{issue}");
    }
    if !issues.is_empty() {
        anyhow::bail!("{} issue(s) found in {}", issues.len(), args.notebook);
    }
    println!("ok");
    Ok(())
}
