//! Integration tests for Recall

mod memo_tests {
    use recall::{
        CallEntry, CallRecord, LazyRef, Matrix, Memo, RecallError, RecallResult, Value,
    };
    use std::cell::Cell;
    use tempfile::TempDir;

    fn ones_call(rows: i64, cols: i64) -> CallRecord {
        CallRecord::single(CallEntry::new("ones").arg(rows).arg(cols))
    }

    fn ones(record: CallRecord) -> RecallResult<Matrix> {
        let entry = record.primary()?;
        Ok(Matrix::ones(
            entry.positional_as::<i64>(0)? as usize,
            entry.positional_as::<i64>(1)? as usize,
        ))
    }

    fn sum(record: CallRecord) -> RecallResult<f64> {
        let m: Matrix = record.primary()?.positional_as(0)?;
        Ok(m.sum())
    }

    #[test]
    fn scenario_sum_of_ones() {
        let temp = TempDir::new().unwrap();
        let memo = Memo::open(temp.path());

        let m = memo.compute_or_fetch(ones_call(3, 3), "p_", ones).unwrap();
        let total = memo
            .compute_or_fetch(CallRecord::single(CallEntry::new("sum").arg(m)), "p_", sum)
            .unwrap();
        assert_eq!(total, Value::Float(9.0));

        let names: Vec<_> = memo
            .list_entries("p_")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names.len(), 2);
        assert_eq!(names[0], "p_ones[3,3;].json");
        assert!(names[1].starts_with("p_sum[hash_"));
    }

    #[test]
    fn results_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let computed = Cell::new(0);
        let counting = |r: CallRecord| {
            computed.set(computed.get() + 1);
            ones(r)
        };

        let first = Memo::open(temp.path())
            .compute_or_fetch(ones_call(2, 4), "", counting)
            .unwrap();
        let second = Memo::open(temp.path())
            .compute_or_fetch(ones_call(2, 4), "", counting)
            .unwrap();

        assert_eq!(computed.get(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn hashed_keys_are_stable_across_instances() {
        let temp = TempDir::new().unwrap();
        let record = CallRecord::single(CallEntry::new("sum").arg(Matrix::ones(3, 3)));

        let a = Memo::open(temp.path()).key_for(&record, "p_");
        let b = Memo::open(temp.path()).key_for(&record, "p_");
        assert!(a.is_hashed());
        assert_eq!(a, b);
    }

    #[test]
    fn reference_transparency() {
        let temp = TempDir::new().unwrap();
        let memo = Memo::open(temp.path());

        let r: LazyRef = memo.compute_or_fetch_ref(ones_call(3, 3), "", ones).unwrap();
        assert_eq!(memo.deref_value(&r).unwrap(), Matrix::ones(3, 3).into());

        let add = |record: CallRecord| -> RecallResult<Matrix> {
            let entry = record.primary()?;
            let a: Matrix = entry.positional_as(0)?;
            let b: Matrix = entry.positional_as(1)?;
            a.add(&b)
        };

        let via_refs = memo
            .compute_or_fetch(
                CallRecord::single(CallEntry::new("+").arg(r.clone()).arg(r.clone())),
                "",
                add,
            )
            .unwrap();
        let via_literals = memo
            .compute_or_fetch(
                CallRecord::single(
                    CallEntry::new("+")
                        .arg(Matrix::ones(3, 3))
                        .arg(Matrix::ones(3, 3)),
                ),
                "",
                add,
            )
            .unwrap();

        assert_eq!(via_refs, Matrix::filled(3, 3, 2.0).into());
        assert_eq!(via_refs, via_literals);
    }

    #[test]
    fn chained_references_keep_keys_short() {
        let temp = TempDir::new().unwrap();
        let memo = Memo::open(temp.path());

        let r = memo.compute_or_fetch_ref(ones_call(50, 50), "", ones).unwrap();
        let total_ref = memo
            .compute_or_fetch_ref(CallRecord::single(CallEntry::new("sum").arg(r)), "", sum)
            .unwrap();

        assert_eq!(total_ref.key(), "sum[ref(ones[50,50;]);].json");
        assert_eq!(
            total_ref.materialize_as::<_, f64>(memo.blobs()).unwrap(),
            2500.0
        );
    }

    #[test]
    fn deleted_entry_breaks_reference() {
        let temp = TempDir::new().unwrap();
        let memo = Memo::open(temp.path());
        let r = memo.compute_or_fetch_ref(ones_call(1, 1), "", ones).unwrap();

        std::fs::remove_file(memo.blobs().path_for(&r.cache_key())).unwrap();

        let err = memo
            .compute_or_fetch(CallRecord::single(CallEntry::new("sum").arg(r)), "", sum)
            .unwrap_err();
        assert!(matches!(err, RecallError::DanglingReference { .. }));
    }

    #[test]
    fn multi_entry_record() {
        let temp = TempDir::new().unwrap();
        let memo = Memo::open(temp.path());
        let record = CallRecord::builder()
            .with(CallEntry::new("ones").arg(2).arg(2))
            .with(CallEntry::new("scale").kwarg("factor", 3.0).kwarg("inplace", false))
            .finalize();

        let value = memo
            .compute_or_fetch(record.clone(), "", |r| {
                let m = ones(r.clone())?;
                let factor: f64 = r.entries()[1].keyword_as("factor")?;
                Ok(m.sum() * factor)
            })
            .unwrap();

        assert_eq!(value, Value::Float(12.0));
        assert_eq!(
            memo.key_for(&record, "").as_str(),
            "ones[2,2;]_scale[;factor=3.0].json"
        );
    }
}

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use recall::{CallEntry, CallRecord, Matrix, Memo, Value};
    use tempfile::TempDir;

    fn recall(temp: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("recall");
        cmd.arg("--config")
            .arg(temp.path().join("config.toml"))
            .arg("--cache-dir")
            .arg(temp.path().join("cache"));
        cmd
    }

    fn populate(temp: &TempDir) {
        let memo = Memo::open(temp.path().join("cache"));
        memo.store(
            CallRecord::single(CallEntry::new("ones").arg(3).arg(3)),
            Matrix::ones(3, 3).into(),
            "p_",
        )
        .unwrap();
        memo.store(
            CallRecord::single(CallEntry::new("sum").arg(Matrix::ones(3, 3))),
            Value::Float(9.0),
            "p_",
        )
        .unwrap();
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        recall(&temp)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("memoization"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        recall(&temp)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("recall"));
    }

    #[test]
    fn list_empty() {
        let temp = TempDir::new().unwrap();
        recall(&temp)
            .args(["list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn list_plain_names() {
        let temp = TempDir::new().unwrap();
        populate(&temp);
        recall(&temp)
            .args(["list", "p_", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("p_ones[3,3;].json"))
            .stdout(predicate::str::contains("p_sum[hash_"));
    }

    #[test]
    fn list_table_shows_records() {
        let temp = TempDir::new().unwrap();
        populate(&temp);
        recall(&temp)
            .args(["list", "p_"])
            .assert()
            .success()
            .stdout(predicate::str::contains("ones(3, 3)"))
            .stdout(predicate::str::contains("2 entries"));
    }

    #[test]
    fn list_survives_corrupt_entry() {
        let temp = TempDir::new().unwrap();
        populate(&temp);
        std::fs::write(temp.path().join("cache").join("p_broken.json"), "{").unwrap();
        recall(&temp)
            .args(["list", "p_"])
            .assert()
            .success()
            .stdout(predicate::str::contains("unreadable"))
            .stdout(predicate::str::contains("ones(3, 3)"))
            .stdout(predicate::str::contains("3 entries"));
    }

    #[test]
    fn show_entry() {
        let temp = TempDir::new().unwrap();
        populate(&temp);
        recall(&temp)
            .args(["show", "p_ones[3,3;]"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[1.0 1.0 1.0; 1.0 1.0 1.0; 1.0 1.0 1.0]"));
    }

    #[test]
    fn show_missing_entry() {
        let temp = TempDir::new().unwrap();
        recall(&temp)
            .args(["show", "nonexistent"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cache entry not found"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        recall(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        recall(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"));
    }

    #[test]
    fn config_init_writes_file() {
        let temp = TempDir::new().unwrap();
        recall(&temp).args(["config", "init"]).assert().success();
        assert!(temp.path().join("config.toml").exists());
    }
}
