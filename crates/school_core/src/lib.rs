pub mod attendance;
pub mod domain;
pub mod finance;
pub mod grading;
pub mod ports;
pub mod report;
pub mod rules;
pub mod year_scope;

pub use domain::{
    AbsenceReason, AttendanceRecord, EvaluationPeriod, Expense, Grade, NewAttendance, NewClass,
    NewExpense, NewPayment, NewPeriod, NewStudent, NewSubject, NewTeacher, Payment, Role,
    SchoolClass, SchoolYear, StaffCredentials, StaffUser, Student, Subject, Teacher, YearId,
};
pub use ports::{DatabaseService, PortError, PortResult};
pub use report::{generate_class_report, ClassReport, ReportCard, ReportFailure, ReportLine};
pub use rules::{FinalStatus, NewRule, Rule, RuleSet, RuleValidationError};
pub use year_scope::{transfer, TransferError, TransferKind, TransferReport, TransferRequest};
