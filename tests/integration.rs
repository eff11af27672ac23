use std::{str::from_utf8, sync::Mutex};

use atomic_ledger::{
    bin_utils::{Service, ServiceReport},
    config::ServiceConfig,
    executor::TransferError,
};

const ACCOUNTS: &str = include_str!("accounts.csv");
const TRANSFERS: &str = include_str!("transfers.csv");

#[test]
fn process_transfers() {
    let mut output = Vec::new();
    let mut ledger = Vec::new();
    let errors = Mutex::new(Vec::new());
    let service = Service {
        accounts: ACCOUNTS.as_bytes(),
        transfers: TRANSFERS.as_bytes(),
        output: &mut output,
        ledger_output: Some(Box::new(&mut ledger)),
        config: ServiceConfig::default(),
        error_printer: Box::new(|line: u64, err: &TransferError| {
            let kind = match err {
                TransferError::InvalidRequest(_) => "invalid",
                TransferError::AccountNotFound { .. } => "not found",
                TransferError::InsufficientFunds => "insufficient",
                TransferError::ConflictRetryable => "conflict",
                TransferError::StoreFailure => "failure",
            };
            errors.lock().unwrap().push((line, kind));
        }),
    };
    let report = service.run().unwrap();
    assert_eq!(
        report,
        ServiceReport {
            committed: 3,
            failed: 5
        }
    );

    // accounts are printed in id order
    assert_eq!(
        from_utf8(&output).unwrap(),
        "id,owner,balance\nacc-1,Alice,96\nacc-2,Bob,29.5\nacc-3,Carol,0.00\n"
    );

    let errors = errors.into_inner().unwrap();
    assert_eq!(
        errors,
        vec![
            (3, "invalid"),
            (4, "invalid"),
            (5, "insufficient"),
            (7, "not found"),
            (8, "invalid"),
        ]
    );

    let ledger = from_utf8(&ledger).unwrap();
    let lines: Vec<_> = ledger.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "id,from_account,to_account,amount,created_at");
    assert!(lines[1].starts_with("1,acc-1,acc-2,30,"));
    assert!(lines[2].starts_with("2,acc-2,acc-3,0.5,"));
    assert!(lines[3].starts_with("3,acc-3,acc-1,26,"));
}

#[test]
fn many_workers_conserve_total() {
    let accounts = "id,owner,balance\na,A,500\nb,B,500\nc,C,500\nd,D,500\n";
    let ids = ["a", "b", "c", "d"];
    let mut transfers = String::from("from,to,amount\n");
    for i in 0..400usize {
        let from = ids[i % 4];
        let to = ids[(i * 7 + 1) % 4];
        transfers.push_str(&format!("{from},{to},{}\n", i % 90 + 1));
    }

    let mut output = Vec::new();
    let service = Service {
        accounts: accounts.as_bytes(),
        transfers: transfers.as_bytes(),
        output: &mut output,
        ledger_output: None,
        config: ServiceConfig {
            workers: 8,
            conflict_retries: 3,
            ..ServiceConfig::default()
        },
        error_printer: Box::new(|_: u64, err: &TransferError| {
            assert!(!matches!(
                err,
                TransferError::ConflictRetryable | TransferError::StoreFailure
            ));
        }),
    };
    let report = service.run().unwrap();
    assert_eq!(report.committed + report.failed, 400);

    let total: i64 = from_utf8(&output)
        .unwrap()
        .lines()
        .skip(1)
        .map(|line| {
            let balance: i64 = line.rsplit(',').next().unwrap().parse().unwrap();
            assert!(balance >= 0);
            balance
        })
        .sum();
    assert_eq!(total, 2000);
}

#[test]
fn malformed_transfer_aborts_the_run() {
    let mut output = Vec::new();
    let service = Service {
        accounts: ACCOUNTS.as_bytes(),
        transfers: "from,to,amount\nacc-1,acc-2,1\nacc-1,acc-2,plenty\n".as_bytes(),
        output: &mut output,
        ledger_output: None,
        config: ServiceConfig::default(),
        error_printer: Box::new(|_: u64, _: &TransferError| {}),
    };
    let err = service.run().unwrap_err();
    assert_eq!(err.to_string(), "Malformed transfer at line 3");
    assert!(output.is_empty());
}

#[test]
fn duplicate_account_aborts_the_run() {
    let mut output = Vec::new();
    let service = Service {
        accounts: "id,owner,balance\na,A,1\na,Again,2\n".as_bytes(),
        transfers: "from,to,amount\n".as_bytes(),
        output: &mut output,
        ledger_output: None,
        config: ServiceConfig::default(),
        error_printer: Box::new(|_: u64, _: &TransferError| {}),
    };
    let err = service.run().unwrap_err();
    assert_eq!(err.to_string(), "Cannot open account at line 3");
}
