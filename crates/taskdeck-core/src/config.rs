use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow,
  bail
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::sort::{
  SortConfig,
  SortDirection,
  SortKey
};

pub const RC_ENV: &str = "TASKDECKRC";
pub const API_URL_ENV: &str =
  "TASKDECK_API_URL";

const DEFAULTS: [(&str, &str); 6] = [
  ("api.url", "http://localhost:3000"),
  ("api.timeout", "30"),
  ("data.location", "~/.taskdeck"),
  ("color", "on"),
  ("default.sort", "title"),
  ("default.direction", "asc")
];

/// Settings from the rc file layered
/// over built-in defaults.
#[derive(Debug, Clone)]
pub struct Config {
  map:              BTreeMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      map:          DEFAULTS
        .iter()
        .map(|(k, v)| {
          (k.to_string(), v.to_string())
        })
        .collect(),
      loaded_files: vec![]
    }
  }
}

enum RcLine<'a> {
  Blank,
  Include(&'a str),
  Setting(&'a str, &'a str)
}

impl Config {
  /// Defaults, then the rc file, then
  /// `$TASKDECK_API_URL`.
  #[tracing::instrument(skip(
    taskrc_override
  ))]
  pub fn load(
    taskrc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc_env =
      std::env::var(RC_ENV).ok();
    match resolve_taskrc_path(
      taskrc_override,
      rc_env.as_deref()
    )? {
      | Some(path) => {
        info!(taskrc = %path.display(), "loading taskrc");
        cfg.load_file(&path)?;
      }
      | None => {
        debug!("no taskrc found; using defaults");
      }
    }

    if let Ok(url) =
      std::env::var(API_URL_ENV)
      && !url.trim().is_empty()
    {
      debug!(url = %url, "api.url from environment");
      cfg.set("api.url", url.trim());
    }

    Ok(cfg)
  }

  /// `--rc` and positional `rc.`
  /// overrides; last one wins.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key =
        k.strip_prefix("rc.").unwrap_or(&k);
      debug!(key, value = %v, "applying override");
      self.set(key, &v);
    }
  }

  pub fn set(
    &mut self,
    key: &str,
    value: &str
  ) {
    self.map.insert(
      key.trim().to_string(),
      value.trim().to_string()
    );
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<&str> {
    self.map.get(key).map(String::as_str)
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self.get(key).map(parse_bool)
  }

  pub fn api_url(&self) -> &str {
    self
      .get("api.url")
      .unwrap_or(DEFAULTS[0].1)
  }

  pub fn api_timeout(
    &self
  ) -> anyhow::Result<Duration> {
    let raw =
      self.get("api.timeout").unwrap_or("30");
    let secs: u64 =
      raw.parse().with_context(|| {
        format!(
          "api.timeout must be a whole \
           number of seconds, got {raw:?}"
        )
      })?;
    if secs == 0 {
      bail!(
        "api.timeout must be at least \
         1 second"
      );
    }
    Ok(Duration::from_secs(secs))
  }

  pub fn color(&self) -> bool {
    self.get_bool("color").unwrap_or(true)
  }

  pub fn default_sort(
    &self
  ) -> anyhow::Result<SortConfig> {
    let key: SortKey = self
      .get("default.sort")
      .unwrap_or("title")
      .parse()
      .context("invalid default.sort")?;
    let direction: SortDirection = self
      .get("default.direction")
      .unwrap_or("asc")
      .parse()
      .context(
        "invalid default.direction"
      )?;
    Ok(SortConfig::new(key, direction))
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    if self.loaded_files.contains(&path) {
      warn!(file = %path.display(), "taskrc already loaded; skipping include cycle");
      return Ok(());
    }
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (idx, raw_line) in
      text.lines().enumerate()
    {
      let line_no = idx + 1;
      match parse_line(raw_line)
        .with_context(|| {
          format!(
            "invalid config line {}:{}",
            path.display(),
            line_no
          )
        })? {
        | RcLine::Blank => {}
        | RcLine::Include(rest) => {
          let include =
            resolve_include_path(
              &base_dir, rest
            )?;
          if include.exists() {
            debug!(include = %include.display(), line = line_no, "processing include");
            self.load_file(&include)?;
          } else {
            warn!(include = %include.display(), "include file does not exist; skipping");
          }
        }
        | RcLine::Setting(key, value) => {
          trace!(key, value, "loaded config key");
          self.set(key, value);
        }
      }
    }

    Ok(())
  }
}

fn parse_line(
  raw: &str
) -> anyhow::Result<RcLine<'_>> {
  let line = raw
    .split_once('#')
    .map_or(raw, |(before, _)| before)
    .trim();
  if line.is_empty() {
    return Ok(RcLine::Blank);
  }
  if let Some(rest) =
    line.strip_prefix("include ")
  {
    return Ok(RcLine::Include(
      rest.trim()
    ));
  }
  let (key, value) = line
    .split_once('=')
    .ok_or_else(|| {
      anyhow!("expected key = value: {raw}")
    })?;
  let key = key.trim();
  if key.is_empty() {
    return Err(anyhow!(
      "empty key: {raw}"
    ));
  }
  Ok(RcLine::Setting(key, value.trim()))
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = match override_dir {
    | Some(path) => path.to_path_buf(),
    | None => match cfg.get("data.location")
    {
      | Some(value) => {
        expand_tilde(Path::new(value))
      }
      | None => home_dir()?.join(".taskdeck")
    }
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

/// `--taskrc`, then `$TASKDECKRC`
/// (`/dev/null` disables), then
/// `~/.taskdeckrc` when present.
fn resolve_taskrc_path(
  override_path: Option<&Path>,
  rc_env: Option<&str>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Some(value) = rc_env {
    if value == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(value)));
  }

  let candidate =
    home_dir()?.join(".taskdeckrc");
  Ok(candidate.exists().then_some(candidate))
}

fn home_dir() -> anyhow::Result<PathBuf> {
  dirs::home_dir().ok_or_else(|| {
    anyhow!(
      "cannot determine home directory"
    )
  })
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }
  let expanded =
    expand_tilde(Path::new(include));
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::time::Duration;

  use tempfile::tempdir;

  use super::*;

  #[test]
  fn defaults_cover_every_key() {
    let cfg = Config::default();
    assert_eq!(
      cfg.api_url(),
      "http://localhost:3000"
    );
    assert_eq!(
      cfg.api_timeout().unwrap(),
      Duration::from_secs(30)
    );
    assert!(cfg.color());
    assert_eq!(
      cfg.default_sort().unwrap(),
      SortConfig::default()
    );
  }

  #[test]
  fn rc_file_with_include_and_comments()
  {
    let temp = tempdir().unwrap();
    fs::write(
      temp.path().join("extra.rc"),
      "default.sort = due\n"
    )
    .unwrap();
    let main = temp.path().join("main.rc");
    fs::write(
      &main,
      "# taskdeck\napi.url = \
       https://tasks.example.com # prod\n\
       color=off\ninclude extra.rc\n\
       include missing.rc\n"
    )
    .unwrap();

    let mut cfg = Config::default();
    cfg.load_file(&main).unwrap();

    assert_eq!(
      cfg.api_url(),
      "https://tasks.example.com"
    );
    assert!(!cfg.color());
    assert_eq!(
      cfg.default_sort().unwrap().key,
      SortKey::DueDate
    );
    assert_eq!(cfg.loaded_files.len(), 2);
  }

  #[test]
  fn include_cycles_are_cut() {
    let temp = tempdir().unwrap();
    let a = temp.path().join("a.rc");
    fs::write(&a, "include a.rc\ncolor = off\n")
      .unwrap();
    let mut cfg = Config::default();
    cfg.load_file(&a).unwrap();
    assert!(!cfg.color());
  }

  #[test]
  fn malformed_line_names_its_location() {
    let temp = tempdir().unwrap();
    let rc = temp.path().join("bad.rc");
    fs::write(&rc, "color on\n").unwrap();
    let err = Config::default()
      .load_file(&rc)
      .unwrap_err();
    assert!(
      format!("{err:#}").contains("bad.rc:1")
    );
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::default();
    cfg.apply_overrides([
      (
        "rc.api.timeout".to_string(),
        "5".to_string()
      ),
      (
        "default.direction".to_string(),
        "desc".to_string()
      )
    ]);
    assert_eq!(
      cfg.api_timeout().unwrap(),
      Duration::from_secs(5)
    );
    assert_eq!(
      cfg.default_sort().unwrap().direction,
      SortDirection::Desc
    );

    cfg.set("api.timeout", "soon");
    assert!(cfg.api_timeout().is_err());
  }

  #[test]
  fn zero_timeout_is_rejected() {
    let mut cfg = Config::default();
    cfg.set("api.timeout", "0");
    let err = cfg.api_timeout().unwrap_err();
    assert!(
      err.to_string().contains("at least")
    );

    cfg.set("api.timeout", "1");
    assert_eq!(
      cfg.api_timeout().unwrap(),
      Duration::from_secs(1)
    );
  }

  #[test]
  fn taskrc_resolution_order() {
    let explicit = Path::new("/tmp/x.rc");
    assert_eq!(
      resolve_taskrc_path(
        Some(explicit),
        Some("/tmp/env.rc")
      )
      .unwrap(),
      Some(explicit.to_path_buf())
    );
    assert_eq!(
      resolve_taskrc_path(
        None,
        Some("/tmp/env.rc")
      )
      .unwrap(),
      Some(PathBuf::from("/tmp/env.rc"))
    );
    assert_eq!(
      resolve_taskrc_path(
        None,
        Some("/dev/null")
      )
      .unwrap(),
      None
    );
  }

  #[test]
  fn data_dir_override_is_created() {
    let temp = tempdir().unwrap();
    let dir = temp.path().join("nested/data");
    let resolved = resolve_data_dir(
      &Config::default(),
      Some(&dir)
    )
    .unwrap();
    assert_eq!(resolved, dir);
    assert!(dir.is_dir());
  }
}
