//! SQL schema for the gradebook SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS students (
    student_id TEXT PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name  TEXT NOT NULL
);

-- Class membership per term.
CREATE TABLE IF NOT EXISTS enrolments (
    class_id      TEXT    NOT NULL,
    student_id    TEXT    NOT NULL REFERENCES students(student_id),
    term          TEXT    NOT NULL,   -- 'first' | 'second' | 'third'
    academic_year INTEGER NOT NULL,
    PRIMARY KEY (class_id, student_id, term, academic_year)
);

CREATE TABLE IF NOT EXISTS subject_assignments (
    subject_assignment_id TEXT    PRIMARY KEY,
    class_id              TEXT    NOT NULL,
    subject_name          TEXT    NOT NULL,
    subject_teacher       TEXT    NOT NULL,
    sort_order            INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS registrations (
    student_id            TEXT    NOT NULL REFERENCES students(student_id),
    subject_assignment_id TEXT    NOT NULL REFERENCES subject_assignments(subject_assignment_id),
    term                  TEXT    NOT NULL,
    academic_year         INTEGER NOT NULL,
    active                INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (student_id, subject_assignment_id, term, academic_year)
);

-- Components are decimal strings, exactly as entered.
CREATE TABLE IF NOT EXISTS score_records (
    student_id            TEXT    NOT NULL,
    subject_assignment_id TEXT    NOT NULL REFERENCES subject_assignments(subject_assignment_id),
    term                  TEXT    NOT NULL,
    academic_year         INTEGER NOT NULL,
    ca1                   TEXT    NOT NULL,
    ca2                   TEXT    NOT NULL,
    exam                  TEXT    NOT NULL,
    status                TEXT    NOT NULL DEFAULT 'draft',
    updated_at            TEXT    NOT NULL,
    PRIMARY KEY (student_id, subject_assignment_id, term, academic_year)
);

CREATE TABLE IF NOT EXISTS attendance (
    student_id    TEXT    NOT NULL,
    term          TEXT    NOT NULL,
    academic_year INTEGER NOT NULL,
    present       INTEGER NOT NULL,
    required_days INTEGER NOT NULL,
    PRIMARY KEY (student_id, term, academic_year)
);

CREATE TABLE IF NOT EXISTS ratings (
    student_id       TEXT    NOT NULL,
    class_id         TEXT    NOT NULL,
    term             TEXT    NOT NULL,
    academic_year    INTEGER NOT NULL,
    affective_json   TEXT,
    psychomotor_json TEXT,
    PRIMARY KEY (student_id, class_id, term, academic_year)
);

-- The whole CompiledResult is stored as one JSON document; the key columns
-- are duplicated for lookups.
CREATE TABLE IF NOT EXISTS compiled_results (
    result_id     TEXT    PRIMARY KEY,
    student_id    TEXT    NOT NULL,
    class_id      TEXT    NOT NULL,
    term          TEXT    NOT NULL,
    academic_year INTEGER NOT NULL,
    status        TEXT    NOT NULL,
    document_json TEXT    NOT NULL,
    updated_at    TEXT    NOT NULL,
    UNIQUE (student_id, class_id, term, academic_year)
);

-- Optimistic concurrency counter per class cohort.
CREATE TABLE IF NOT EXISTS cohort_versions (
    class_id      TEXT    NOT NULL,
    term          TEXT    NOT NULL,
    academic_year INTEGER NOT NULL,
    version       INTEGER NOT NULL,
    PRIMARY KEY (class_id, term, academic_year)
);

CREATE TABLE IF NOT EXISTS approvers (
    user_id  TEXT NOT NULL,
    class_id TEXT NOT NULL,
    PRIMARY KEY (user_id, class_id)
);

-- Append-only.
CREATE TABLE IF NOT EXISTS audit_log (
    audit_id           TEXT PRIMARY KEY,
    compiled_result_id TEXT NOT NULL,
    reason             TEXT NOT NULL,
    recorded_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS score_records_cohort_idx
    ON score_records(subject_assignment_id, term, academic_year);
CREATE INDEX IF NOT EXISTS compiled_results_cohort_idx
    ON compiled_results(class_id, term, academic_year);
CREATE INDEX IF NOT EXISTS audit_log_result_idx ON audit_log(compiled_result_id);

PRAGMA user_version = 1;
";
