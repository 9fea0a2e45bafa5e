//! Cache schema, applied on every open. `user_version` records the layout
//! revision.

/// Safe to re-run: every statement is `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per cached document; a later read of the same document replaces
-- the earlier copy.
CREATE TABLE IF NOT EXISTS documents (
    collection      TEXT NOT NULL,   -- slash-separated collection path
    id              TEXT NOT NULL,
    organization_id TEXT,            -- copied out of data_json for filtering
    data_json       TEXT NOT NULL,
    updated_at      TEXT,            -- RFC 3339, copied out of data_json
    cached_at       TEXT NOT NULL,   -- RFC 3339 UTC; when the row was written
    PRIMARY KEY (collection, id)
);

-- Process-wide key/value state, e.g. the `lastSync:<org>` watermark.
CREATE TABLE IF NOT EXISTS sync_state (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS documents_org_idx ON documents(collection, organization_id);

PRAGMA user_version = 1;
";
