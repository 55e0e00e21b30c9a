use super::{types::UtcDateTime, UserId};

/// Creation and modification stamps carried by every competition record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Audit {
    pub added_at: UtcDateTime,
    pub added_by: Option<UserId>,
    pub modified_at: UtcDateTime,
    pub modified_by: Option<UserId>,
}

impl Audit {
    pub fn new(author: Option<UserId>, now: UtcDateTime) -> Audit {
        Audit {
            added_at: now,
            added_by: author,
            modified_at: now,
            modified_by: author,
        }
    }

    pub fn touch(&mut self, editor: Option<UserId>, now: UtcDateTime) {
        self.modified_at = now;
        self.modified_by = editor;
    }
}
