// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! CSV import/export through the ledger.

use chrono::{TimeZone, Utc};
use rk_loyalty::services::csv_codec::{parse_import, write_export};
use rk_loyalty::services::Lookup;

mod common;

#[test]
fn test_import_three_valid_rows_and_one_missing_mobile() {
    let app = common::create_test_app();
    let csv = "Name,Mobile,Stamps Received\n\
               Asha,9988776655,2\n\
               Ravi,9123456780,0\n\
               Sunil,,3\n\
               Meera,9000011111,6\n";

    let parsed = parse_import(csv.as_bytes()).unwrap();
    let report = app.state.ledger.bulk_import(parsed.rows).unwrap();

    assert_eq!(report.created, 3);
    assert_eq!(report.merged, 0);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].row, 3);
    assert!(report.errors[0].to_string().starts_with("Row 3"));

    let meera = app
        .state
        .ledger
        .lookup(Lookup::Mobile("9000011111".into()))
        .unwrap();
    assert!(meera.id.starts_with("RK-"));
    assert_eq!(meera.stamps_received, 6);
    assert_eq!(meera.stamp_history.len(), 6);
    assert!(meera.stamp_history.iter().all(|s| s.added_by == "import"));
    assert_eq!(meera.completion_date, Some(common::start_time()));
    assert!(!meera.is_active);

    // Completion via import does not notify.
    assert_eq!(app.notifier.count(), 0);
}

#[tokio::test]
async fn test_import_merges_existing_customer_without_lowering_stamps() {
    let app = common::create_test_app();
    let ledger = &app.state.ledger;
    let asha = ledger.register("Asha", "9988776655").unwrap();
    for _ in 0..4 {
        ledger.add_stamp(&asha.id, "rkadmin").await.unwrap();
    }

    let csv = format!(
        "customer_id,name,mobile,stampsReceived\n\
         {},Asha K,9988776655,2\n\
         ,Asha Kumari,9988776655,5\n",
        asha.id.to_lowercase()
    );
    let parsed = parse_import(csv.as_bytes()).unwrap();
    let report = ledger.bulk_import(parsed.rows).unwrap();

    assert_eq!(report.created, 0);
    assert_eq!(report.merged, 2);
    assert_eq!(report.rejected, 0);

    let stored = ledger.lookup(Lookup::Id(asha.id.clone())).unwrap();
    assert_eq!(stored.name, "Asha Kumari");
    assert_eq!(stored.stamps_received, 5);
    assert_eq!(stored.stamp_history.len(), 5);
    assert_eq!(stored.stamp_history[4].added_by, "import");
    assert_eq!(stored.stamp_history[0].added_by, "rkadmin");
}

#[test]
fn test_import_rejects_conflicting_identity() {
    let app = common::create_test_app();
    let ledger = &app.state.ledger;
    let asha = ledger.register("Asha", "9988776655").unwrap();
    let ravi = ledger.register("Ravi", "9123456780").unwrap();

    let csv = format!(
        "Customer ID,Name,Mobile\n\
         {},Asha,9123456780\n\
         {},Ravi,9000000009\n",
        asha.id, ravi.id
    );
    let parsed = parse_import(csv.as_bytes()).unwrap();
    let report = ledger.bulk_import(parsed.rows).unwrap();

    assert_eq!(report.rejected, 2);
    assert_eq!(report.errors[0].id.as_deref(), Some(asha.id.as_str()));
    assert_eq!(
        ledger.lookup(Lookup::Id(ravi.id)).unwrap().mobile,
        "9123456780"
    );
}

#[test]
fn test_import_keeps_given_id_and_dates() {
    let app = common::create_test_app();
    let csv = "Customer ID,Name,Mobile,Registration Date,Stamps Received,Completion Date,Status\n\
               rk-777001,Old Regular,9000077001,01/02/2024,6,2024-03-10,Completed\n\
               RK-777002,Newer,9000077002,2024-05-01,1,,Active\n";
    let parsed = parse_import(csv.as_bytes()).unwrap();
    let report = app.state.ledger.bulk_import(parsed.rows).unwrap();
    assert_eq!(report.created, 2);

    let old = app
        .state
        .ledger
        .lookup(Lookup::Id("RK-777001".into()))
        .unwrap();
    assert_eq!(
        old.registration_date,
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
    );
    assert_eq!(
        old.completion_date,
        Some(Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap())
    );
}

#[test]
fn test_import_rejects_bad_values_and_continues() {
    let app = common::create_test_app();
    let csv = "Name,Mobile,Stamps Received,Registration Date,Status\n\
               Bad Stamps,9000000001,9,,\n\
               Bad Date,9000000002,1,yesterday,\n\
               Bad Status,9000000003,2,,Completed\n\
               Bad Mobile,90000,1,,\n\
               Good,9000000005,1,,Active\n";
    let parsed = parse_import(csv.as_bytes()).unwrap();
    let report = app.state.ledger.bulk_import(parsed.rows).unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.rejected, 4);
    let rows: Vec<usize> = report.errors.iter().map(|e| e.row).collect();
    assert_eq!(rows, vec![1, 2, 3, 4]);
}

#[test]
fn test_import_rejects_completion_date_without_six_stamps() {
    let app = common::create_test_app();
    let csv = "Name,Mobile,Stamps Received,Completion Date\n\
               Early Bird,9000000011,3,2025-06-01\n\
               Done,9000000012,6,2025-06-01\n";
    let parsed = parse_import(csv.as_bytes()).unwrap();
    let report = app.state.ledger.bulk_import(parsed.rows).unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.errors[0].row, 1);
    assert!(report.errors[0].message.contains("Completion date"));
    assert!(app
        .state
        .ledger
        .lookup(Lookup::Mobile("9000000011".into()))
        .is_err());
}

#[tokio::test]
async fn test_export_newest_first_and_reimport_is_idempotent() {
    let app = common::create_test_app();
    let ledger = &app.state.ledger;

    let first = ledger.register("First", "9000000001").unwrap();
    app.clock.advance(chrono::Duration::minutes(5));
    let second = ledger.register("Second", "9000000002").unwrap();
    for _ in 0..6 {
        ledger.add_stamp(&first.id, "rkadmin").await.unwrap();
    }

    let customers = ledger.export_all().unwrap();
    assert_eq!(customers[0].id, second.id);
    assert_eq!(customers[1].id, first.id);

    let csv = write_export(&customers).unwrap();
    assert!(csv.contains(&format!(
        "{},First,9000000001,2025-06-15,6,2025-06-15,Completed",
        first.id
    )));

    let parsed = parse_import(csv.as_bytes()).unwrap();
    let report = ledger.bulk_import(parsed.rows).unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.merged, 2);
    assert_eq!(report.rejected, 0);

    let stored = ledger.lookup(Lookup::Id(first.id)).unwrap();
    assert_eq!(stored.stamp_history.len(), 6);
    assert_eq!(
        stored.completion_date,
        Some(common::start_time() + chrono::Duration::minutes(5))
    );
}
