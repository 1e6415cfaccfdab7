//! crates/school_core/src/year_scope.rs
//!
//! Transfers: additive copies of selected rows from one school year into another.
//!
//! A transfer never touches the source rows. Copies get fresh ids and the
//! destination year; running the same transfer twice yields two sets of copies.
//! Subjects and students need their class in the destination year: the class
//! with the same label and level is reused, otherwise a stub copy of the source
//! class is created there first. Payments need their student in the destination
//! year (same names, in the resolved class); no student stub is ever created.

use crate::domain::{
    NewExpense, NewPayment, NewPeriod, NewStudent, NewSubject, NewTeacher, YearId,
};
use crate::ports::{DatabaseService, PortError, PortResult};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferKind {
    Classes,
    Subjects,
    Students,
    Teachers,
    Rules,
    Periods,
    Payments,
    Expenses,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub kind: TransferKind,
    pub source: YearId,
    pub destination: YearId,
    /// Source ids, processed in this order. Repeated ids are copied repeatedly.
    pub ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub kind: TransferKind,
    pub requested: usize,
    /// Ids of the new rows in the destination year, in request order.
    pub created_ids: Vec<i64>,
    /// Classes created in the destination year to hold transferred subjects or students.
    pub class_stubs: Vec<i64>,
    /// Requested ids that do not exist in the source year.
    pub missing: Vec<i64>,
    /// Requested ids that exist but whose parent row (class or student) could
    /// not be resolved, in the source year or in the destination year.
    pub orphaned: Vec<i64>,
}

impl TransferReport {
    fn new(request: &TransferRequest) -> Self {
        Self {
            kind: request.kind,
            requested: request.ids.len(),
            created_ids: Vec::new(),
            class_stubs: Vec::new(),
            missing: Vec::new(),
            orphaned: Vec::new(),
        }
    }

    pub fn transferred(&self) -> usize {
        self.created_ids.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Nothing was copied.
    #[error(transparent)]
    Rejected(#[from] PortError),
    /// A storage failure stopped the transfer; `partial` lists what was
    /// already written to the destination year.
    #[error("transfer stopped after {} of {} rows: {cause}", .partial.transferred(), .partial.requested)]
    Aborted {
        partial: TransferReport,
        #[source]
        cause: PortError,
    },
}

// Why a single id could not be copied.
enum CopyFailure {
    Missing,
    Orphaned,
    Storage(PortError),
}

impl From<PortError> for CopyFailure {
    fn from(e: PortError) -> Self {
        CopyFailure::Storage(e)
    }
}

fn lookup(e: PortError) -> CopyFailure {
    match e {
        PortError::NotFound(_) => CopyFailure::Missing,
        other => CopyFailure::Storage(other),
    }
}

fn parent(e: PortError) -> CopyFailure {
    match e {
        PortError::NotFound(_) => CopyFailure::Orphaned,
        other => CopyFailure::Storage(other),
    }
}

/// Maps source classes to their destination counterpart, creating stubs on demand.
struct ClassResolver {
    source: YearId,
    destination: YearId,
    resolved: HashMap<i64, i64>,
}

impl ClassResolver {
    fn new(source: YearId, destination: YearId) -> Self {
        Self {
            source,
            destination,
            resolved: HashMap::new(),
        }
    }

    async fn resolve(
        &mut self,
        db: &dyn DatabaseService,
        source_class_id: i64,
        report: &mut TransferReport,
    ) -> PortResult<i64> {
        if let Some(id) = self.resolved.get(&source_class_id) {
            return Ok(*id);
        }
        let content = db.get_class(self.source, source_class_id).await?.content();
        let target = match db.find_class(self.destination, &content).await? {
            Some(existing) => existing.id,
            None => {
                let stub = db.create_class(self.destination, &content).await?;
                report.class_stubs.push(stub.id);
                stub.id
            }
        };
        self.resolved.insert(source_class_id, target);
        Ok(target)
    }

    /// Finds the destination copy of a source student without creating anything.
    async fn resolve_student(
        &mut self,
        db: &dyn DatabaseService,
        source_student_id: i64,
        report: &mut TransferReport,
    ) -> Result<i64, CopyFailure> {
        let student = db
            .get_student(self.source, source_student_id)
            .await
            .map_err(parent)?;
        let class_id = self
            .resolve(db, student.class_id, report)
            .await
            .map_err(parent)?;
        db.find_student(self.destination, class_id, &student.first_name, &student.last_name)
            .await?
            .map(|s| s.id)
            .ok_or(CopyFailure::Orphaned)
    }
}

/// Copies the requested rows of `request.source` into `request.destination`.
///
/// Ids missing from the source year and ids whose parent cannot be resolved are
/// listed in the report. Any other storage error stops the transfer with
/// `TransferError::Aborted`, which still carries the rows already copied.
pub async fn transfer(
    db: &dyn DatabaseService,
    request: &TransferRequest,
) -> Result<TransferReport, TransferError> {
    if request.source == request.destination {
        return Err(PortError::Invalid("source and destination years must differ".to_string()).into());
    }
    db.get_school_year(request.source).await?;
    db.get_school_year(request.destination).await?;

    let mut report = TransferReport::new(request);
    let mut classes = ClassResolver::new(request.source, request.destination);

    for &id in &request.ids {
        match copy_one(db, request, id, &mut classes, &mut report).await {
            Ok(created) => report.created_ids.push(created),
            Err(CopyFailure::Missing) => report.missing.push(id),
            Err(CopyFailure::Orphaned) => report.orphaned.push(id),
            Err(CopyFailure::Storage(cause)) => {
                return Err(TransferError::Aborted {
                    partial: report,
                    cause,
                })
            }
        }
    }
    Ok(report)
}

async fn copy_one(
    db: &dyn DatabaseService,
    request: &TransferRequest,
    id: i64,
    classes: &mut ClassResolver,
    report: &mut TransferReport,
) -> Result<i64, CopyFailure> {
    let (from, to) = (request.source, request.destination);
    let created = match request.kind {
        TransferKind::Classes => {
            let class = db.get_class(from, id).await.map_err(lookup)?;
            db.create_class(to, &class.content()).await?.id
        }
        TransferKind::Subjects => {
            let subject = db.get_subject(from, id).await.map_err(lookup)?;
            let class_id = classes
                .resolve(db, subject.class_id, report)
                .await
                .map_err(parent)?;
            let copy = NewSubject {
                class_id,
                name: subject.name,
                coefficient: subject.coefficient,
            };
            db.create_subject(to, &copy).await?.id
        }
        TransferKind::Students => {
            let student = db.get_student(from, id).await.map_err(lookup)?;
            let class_id = classes
                .resolve(db, student.class_id, report)
                .await
                .map_err(parent)?;
            let copy = NewStudent {
                class_id,
                first_name: student.first_name,
                last_name: student.last_name,
                category: student.category,
            };
            db.create_student(to, &copy).await?.id
        }
        TransferKind::Teachers => {
            let teacher = db.get_teacher(from, id).await.map_err(lookup)?;
            let copy = NewTeacher {
                first_name: teacher.first_name,
                last_name: teacher.last_name,
                phone: teacher.phone,
            };
            db.create_teacher(to, &copy).await?.id
        }
        TransferKind::Rules => {
            let rule = db.get_rule(from, id).await.map_err(lookup)?;
            db.create_rule(to, &rule.content()).await?.id
        }
        TransferKind::Periods => {
            let period = db.get_period(from, id).await.map_err(lookup)?;
            let copy = NewPeriod {
                name: period.name,
                start_date: period.start_date,
                end_date: period.end_date,
            };
            db.create_period(to, &copy).await?.id
        }
        TransferKind::Payments => {
            let payment = db.get_payment(from, id).await.map_err(lookup)?;
            let student_id = classes.resolve_student(db, payment.student_id, report).await?;
            let copy = NewPayment {
                student_id,
                ..payment.content()
            };
            db.create_payment(to, &copy).await?.id
        }
        TransferKind::Expenses => {
            let expense = db.get_expense(from, id).await.map_err(lookup)?;
            let copy: NewExpense = expense.content();
            db.create_expense(to, &copy).await?.id
        }
    };
    Ok(created)
}
