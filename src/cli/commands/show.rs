//! Show command - print one cached entry

use crate::cli::args::ShowArgs;
use crate::cli::commands::list::truncate;
use crate::config::Config;
use crate::error::RecallResult;
use crate::key::{CacheKey, KEY_SUFFIX};
use crate::store::{BlobStore, FileStore};
use crate::ui::{self, UiContext};

/// Longest result rendering printed in the summary view
const RESULT_WIDTH: usize = 400;

/// Execute the show command
pub fn execute(args: ShowArgs, config: &Config) -> RecallResult<()> {
    let store = FileStore::new(config.cache.dir.clone());
    let key = entry_key(&args.name);
    let entry = store.load_entry(&key)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
        return Ok(());
    }

    let ctx = UiContext::detect();
    ui::intro(&ctx, key.as_str());
    ui::key_value(&ctx, "Path", &store.path_for(&key).display().to_string());
    ui::key_value(&ctx, "Key", if key.is_hashed() { "hashed" } else { "literal" });
    ui::key_value(&ctx, "Format", &entry.format_version.to_string());

    ui::section(&ctx, "Record");
    for call in entry.record.entries() {
        ui::remark(&ctx, &call.to_string());
    }

    ui::section(&ctx, "Result");
    ui::key_value(&ctx, "Type", entry.result.type_name());
    ui::remark(&ctx, &truncate(&entry.result.to_string(), RESULT_WIDTH));

    Ok(())
}

/// Accept entry names with or without the storage suffix
fn entry_key(name: &str) -> CacheKey {
    if name.ends_with(KEY_SUFFIX) {
        CacheKey::from_name(name)
    } else {
        CacheKey::from_name(format!("{}{}", name, KEY_SUFFIX))
    }
}
