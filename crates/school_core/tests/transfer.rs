mod test_support;

use school_core::domain::{
    NewClass, NewExpense, NewPayment, NewPeriod, NewStudent, NewSubject, NewTeacher, YearId,
};
use school_core::ports::{DatabaseService, PortError};
use school_core::rules::NewRule;
use school_core::year_scope::{transfer, TransferError, TransferKind, TransferRequest};
use test_support::{date, InMemoryDb};

async fn two_years(db: &InMemoryDb) -> (YearId, YearId) {
    let from = db.create_school_year("2023-2024").await.unwrap().id;
    let to = db.create_school_year("2024-2025").await.unwrap().id;
    (from, to)
}

fn class(label: &str, level: &str) -> NewClass {
    NewClass { label: label.to_string(), level: level.to_string() }
}

fn student(class_id: i64, first_name: &str, last_name: &str) -> NewStudent {
    NewStudent {
        class_id,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        category: "Non-repeating".to_string(),
    }
}

fn request(kind: TransferKind, source: YearId, destination: YearId, ids: Vec<i64>) -> TransferRequest {
    TransferRequest { kind, source, destination, ids }
}

#[tokio::test]
async fn class_transfer_is_additive_and_not_deduplicated() {
    let db = InMemoryDb::new();
    let (from, to) = two_years(&db).await;
    let a = db.create_class(from, &class("6e A", "6e")).await.unwrap();
    let b = db.create_class(from, &class("6e B", "6e")).await.unwrap();

    let request = TransferRequest {
        kind: TransferKind::Classes,
        source: from,
        destination: to,
        ids: vec![a.id, b.id],
    };

    let first = transfer(&db, &request).await.unwrap();
    assert_eq!(first.requested, 2);
    assert_eq!(first.transferred(), 2);
    assert!(!first.created_ids.contains(&a.id));
    assert!(!first.created_ids.contains(&b.id));

    let copies = db.classes_of(to);
    assert_eq!(copies.len(), 2);
    assert_eq!(copies[0].content(), a.content());
    assert_eq!(copies[1].content(), b.content());

    let second = transfer(&db, &request).await.unwrap();
    assert_eq!(second.transferred(), 2);
    assert_eq!(db.class_count(to), 4);
    assert_eq!(db.class_count(from), 2);
}

#[tokio::test]
async fn subject_transfer_creates_one_class_stub_then_reuses_it() {
    let db = InMemoryDb::new();
    let (from, to) = two_years(&db).await;
    let source_class = db.create_class(from, &class("5e A", "5e")).await.unwrap();
    let mut subject_ids = Vec::new();
    for (name, coefficient) in [("Math", 4), ("History", 2)] {
        let subject = db
            .create_subject(
                from,
                &NewSubject { class_id: source_class.id, name: name.to_string(), coefficient },
            )
            .await
            .unwrap();
        subject_ids.push(subject.id);
    }

    let request = TransferRequest {
        kind: TransferKind::Subjects,
        source: from,
        destination: to,
        ids: subject_ids.clone(),
    };
    let report = transfer(&db, &request).await.unwrap();

    assert_eq!(report.transferred(), 2);
    assert_eq!(report.class_stubs.len(), 1);
    let stub = &db.classes_of(to)[0];
    assert_eq!(stub.content(), source_class.content());
    assert!(db.subjects_of(to).iter().all(|s| s.class_id == stub.id));

    let again = transfer(&db, &request).await.unwrap();
    assert!(again.class_stubs.is_empty());
    assert_eq!(db.class_count(to), 1);
    assert_eq!(db.subjects_of(to).len(), 4);
}

#[tokio::test]
async fn student_transfer_reuses_matching_class() {
    let db = InMemoryDb::new();
    let (from, to) = two_years(&db).await;
    let source_class = db.create_class(from, &class("4e", "4e")).await.unwrap();
    let existing = db.create_class(to, &class("4e", "4e")).await.unwrap();
    let student = db
        .create_student(
            from,
            &NewStudent {
                class_id: source_class.id,
                first_name: "Fatou".to_string(),
                last_name: "Sow".to_string(),
                category: "Repeating(e)".to_string(),
            },
        )
        .await
        .unwrap();

    let report = transfer(
        &db,
        &TransferRequest { kind: TransferKind::Students, source: from, destination: to, ids: vec![student.id] },
    )
    .await
    .unwrap();

    assert!(report.class_stubs.is_empty());
    let copy = db.get_student(to, report.created_ids[0]).await.unwrap();
    assert_eq!(copy.class_id, existing.id);
    assert_eq!(copy.category, "Repeating(e)");
    assert_eq!(db.get_student(from, student.id).await.unwrap(), student);
}

#[tokio::test]
async fn unknown_ids_are_reported_not_silently_dropped() {
    let db = InMemoryDb::new();
    let (from, to) = two_years(&db).await;
    let rule = db
        .create_rule(
            from,
            &NewRule {
                category: "Repeating".to_string(),
                min_average: 0.0,
                max_average: 9.99,
                min_absence: 0,
                max_absence: 30,
                status: "Excluded".to_string(),
            },
        )
        .await
        .unwrap();
    // A rule of the destination year is not part of the source year.
    let foreign = db
        .create_rule(
            to,
            &NewRule {
                category: "Repeating".to_string(),
                min_average: 10.0,
                max_average: 20.0,
                min_absence: 0,
                max_absence: 30,
                status: "Admitted to next grade".to_string(),
            },
        )
        .await
        .unwrap();

    let report = transfer(
        &db,
        &TransferRequest {
            kind: TransferKind::Rules,
            source: from,
            destination: to,
            ids: vec![rule.id, 9_999, foreign.id],
        },
    )
    .await
    .unwrap();

    assert_eq!(report.requested, 3);
    assert_eq!(report.transferred(), 1);
    assert_eq!(report.missing, vec![9_999, foreign.id]);

    let destination_rules = db.list_rules(to).await.unwrap();
    assert_eq!(destination_rules.len(), 2);
    let copied = destination_rules.iter().last().unwrap();
    assert_eq!(copied.content(), rule.content());
}

#[tokio::test]
async fn same_year_or_unknown_year_is_rejected() {
    let db = InMemoryDb::new();
    let (from, _) = two_years(&db).await;

    let same = request(TransferKind::Classes, from, from, vec![]);
    assert!(matches!(
        transfer(&db, &same).await,
        Err(TransferError::Rejected(PortError::Invalid(_)))
    ));

    let unknown = request(TransferKind::Classes, from, YearId(404), vec![]);
    assert!(matches!(
        transfer(&db, &unknown).await,
        Err(TransferError::Rejected(PortError::NotFound(_)))
    ));
}

#[tokio::test]
async fn storage_failure_midway_still_reports_rows_already_copied() {
    let db = InMemoryDb::new();
    let (from, to) = two_years(&db).await;
    let a = db.create_class(from, &class("3e A", "3e")).await.unwrap();
    let b = db.create_class(from, &class("3e B", "3e")).await.unwrap();
    let c = db.create_class(from, &class("3e C", "3e")).await.unwrap();
    db.fail_creates_after(1);

    let err = transfer(&db, &request(TransferKind::Classes, from, to, vec![a.id, b.id, c.id]))
        .await
        .unwrap_err();

    let TransferError::Aborted { partial, cause } = err else {
        panic!("expected an aborted transfer, got {err:?}");
    };
    assert!(matches!(cause, PortError::Unexpected(_)));
    assert_eq!(partial.requested, 3);
    assert_eq!(partial.transferred(), 1);
    let copies = db.classes_of(to);
    assert_eq!(copies.len(), 1);
    assert_eq!(partial.created_ids, vec![copies[0].id]);
    assert_eq!(copies[0].content(), a.content());
}

#[tokio::test]
async fn subject_whose_class_vanished_is_orphaned_not_missing() {
    let db = InMemoryDb::new();
    let (from, to) = two_years(&db).await;
    let source_class = db.create_class(from, &class("2nde", "2nde")).await.unwrap();
    let subject = db
        .create_subject(
            from,
            &NewSubject { class_id: source_class.id, name: "Physics".to_string(), coefficient: 3 },
        )
        .await
        .unwrap();
    db.drop_class(source_class.id);

    let report = transfer(&db, &request(TransferKind::Subjects, from, to, vec![subject.id, 777]))
        .await
        .unwrap();

    assert_eq!(report.orphaned, vec![subject.id]);
    assert_eq!(report.missing, vec![777]);
    assert_eq!(report.transferred(), 0);
    assert!(report.class_stubs.is_empty());
}

#[tokio::test]
async fn teacher_and_period_copies_keep_content_with_fresh_ids() {
    let db = InMemoryDb::new();
    let (from, to) = two_years(&db).await;
    let teacher = db
        .create_teacher(
            from,
            &NewTeacher {
                first_name: "Aminata".to_string(),
                last_name: "Diallo".to_string(),
                phone: Some("+221 77 000 00 00".to_string()),
            },
        )
        .await
        .unwrap();
    let first_term = db
        .create_period(
            from,
            &NewPeriod {
                name: "First term".to_string(),
                start_date: Some(date(2023, 9, 4)),
                end_date: Some(date(2023, 12, 22)),
            },
        )
        .await
        .unwrap();
    let open_ended = db
        .create_period(
            from,
            &NewPeriod { name: "Final exams".to_string(), start_date: Some(date(2024, 6, 3)), end_date: None },
        )
        .await
        .unwrap();

    let teachers = transfer(&db, &request(TransferKind::Teachers, from, to, vec![teacher.id]))
        .await
        .unwrap();
    let copy = db.get_teacher(to, teachers.created_ids[0]).await.unwrap();
    assert_ne!(copy.id, teacher.id);
    assert_eq!(copy.year_id, to);
    assert_eq!(
        (copy.first_name.as_str(), copy.last_name.as_str(), copy.phone.as_deref()),
        ("Aminata", "Diallo", Some("+221 77 000 00 00"))
    );

    let periods = transfer(
        &db,
        &request(TransferKind::Periods, from, to, vec![first_term.id, open_ended.id]),
    )
    .await
    .unwrap();
    assert_eq!(periods.transferred(), 2);
    for (created, original) in periods.created_ids.iter().zip([&first_term, &open_ended]) {
        let copy = db.get_period(to, *created).await.unwrap();
        assert_ne!(copy.id, original.id);
        assert_eq!(copy.name, original.name);
        assert_eq!(copy.start_date, original.start_date);
        assert_eq!(copy.end_date, original.end_date);
    }
    assert_eq!(db.list_periods(from).await.unwrap().len(), 2);
}

#[tokio::test]
async fn payments_follow_their_student_and_expenses_copy_as_is() {
    let db = InMemoryDb::new();
    let (from, to) = two_years(&db).await;
    let source_class = db.create_class(from, &class("CM2", "CM2")).await.unwrap();
    let moussa = db.create_student(from, &student(source_class.id, "Moussa", "Ba")).await.unwrap();
    let awa = db.create_student(from, &student(source_class.id, "Awa", "Ndiaye")).await.unwrap();

    // Only Moussa has been carried over to the new year.
    transfer(&db, &request(TransferKind::Students, from, to, vec![moussa.id]))
        .await
        .unwrap();
    let moussa_next = db.list_students(to, db.classes_of(to)[0].id).await.unwrap()[0].clone();

    let mut payment_ids = Vec::new();
    for payer in [&moussa, &awa] {
        let payment = db
            .create_payment(
                from,
                &NewPayment {
                    student_id: payer.id,
                    amount: 25_000,
                    date: date(2024, 6, 28),
                    label: "Registration deposit".to_string(),
                },
            )
            .await
            .unwrap();
        payment_ids.push(payment.id);
    }
    let expense = db
        .create_expense(
            from,
            &NewExpense { label: "Exam papers".to_string(), amount: 12_500, date: date(2024, 6, 1) },
        )
        .await
        .unwrap();

    let payments = transfer(&db, &request(TransferKind::Payments, from, to, payment_ids.clone()))
        .await
        .unwrap();
    assert_eq!(payments.transferred(), 1);
    assert_eq!(payments.orphaned, vec![payment_ids[1]]);
    let copied = db.get_payment(to, payments.created_ids[0]).await.unwrap();
    assert_eq!(copied.student_id, moussa_next.id);
    assert_eq!(copied.amount, 25_000);
    assert_eq!(copied.label, "Registration deposit");

    let expenses = transfer(&db, &request(TransferKind::Expenses, from, to, vec![expense.id]))
        .await
        .unwrap();
    let copied = db.get_expense(to, expenses.created_ids[0]).await.unwrap();
    assert_ne!(copied.id, expense.id);
    assert_eq!(copied.content(), expense.content());
    assert_eq!(db.list_expenses(from).await.unwrap(), vec![expense]);
}
