use chrono::{DateTime, Utc};
use std::borrow::Cow;

use super::field_map::{map_fields, FieldMap};
use super::metrics::{character_count, post_category, word_count};
use super::normalize::{
    coerce_float, coerce_id, coerce_text, extract_domain, lowercase_email, presence,
    strip_whitespace, truncate,
};
use crate::domain::model::{
    EntityKind, FieldDiagnostics, FieldIssue, ProcessedPost, ProcessedUser, RawRecord,
    RejectReason,
};

pub const USERNAME_MAX_LEN: usize = 100;
pub const NAME_MAX_LEN: usize = 200;
pub const PHONE_MAX_LEN: usize = 50;
pub const WEBSITE_MAX_LEN: usize = 200;
pub const CITY_MAX_LEN: usize = 100;
pub const ZIPCODE_MAX_LEN: usize = 20;
pub const COMPANY_NAME_MAX_LEN: usize = 200;
pub const TITLE_MAX_LEN: usize = 500;

/// Values shared by every record of one run. Transformers never read the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformContext {
    pub run_timestamp: DateTime<Utc>,
}

impl TransformContext {
    pub fn new(run_timestamp: DateTime<Utc>) -> Self {
        Self { run_timestamp }
    }
}

/// Turns one raw record into a processed row, or rejects it.
///
/// Implementations are pure: the same raw record and context always give the
/// same result, which lets the batch driver run them on any thread.
pub trait RecordTransformer: Send + Sync {
    type Output: Send;

    fn kind(&self) -> EntityKind;

    fn transform(
        &self,
        raw: &RawRecord,
        ctx: &TransformContext,
        diagnostics: &mut FieldDiagnostics,
    ) -> Result<Self::Output, RejectReason>;
}

/// Raw fields of one record plus the sink for degradation counts.
struct Fields<'r, 'd> {
    map: FieldMap<'r>,
    diagnostics: &'d mut FieldDiagnostics,
}

impl<'r, 'd> Fields<'r, 'd> {
    fn new(raw: &'r RawRecord, kind: EntityKind, diagnostics: &'d mut FieldDiagnostics) -> Self {
        Self {
            map: map_fields(raw, kind),
            diagnostics,
        }
    }

    fn id(&self, path: &str) -> Option<i64> {
        coerce_id(self.map.get(path))
    }

    fn text(&mut self, path: &'static str) -> Option<Cow<'r, str>> {
        match coerce_text(self.map.get(path)) {
            Ok(s) => Some(s),
            Err(issue) => {
                self.diagnostics.record(path, issue);
                None
            }
        }
    }

    fn float(&mut self, path: &'static str) -> Option<f64> {
        let raw = self.map.get(path);
        let parsed = coerce_float(raw);
        if parsed.is_none() {
            let issue = match raw.value() {
                None => FieldIssue::Absent,
                Some(_) => FieldIssue::WrongType,
            };
            self.diagnostics.record(path, issue);
        }
        parsed
    }

    fn truncated(&mut self, path: &'static str, max_len: usize) -> String {
        let value = self.text(path);
        truncate(value.as_deref(), max_len)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UserTransformer;

impl RecordTransformer for UserTransformer {
    type Output = ProcessedUser;

    fn kind(&self) -> EntityKind {
        EntityKind::User
    }

    fn transform(
        &self,
        raw: &RawRecord,
        ctx: &TransformContext,
        diagnostics: &mut FieldDiagnostics,
    ) -> Result<ProcessedUser, RejectReason> {
        let mut fields = Fields::new(raw, EntityKind::User, diagnostics);
        let user_id = fields.id("id").ok_or(RejectReason::MissingId)?;

        let email_raw = fields.text("email");
        let email = lowercase_email(email_raw.as_deref());
        let email_domain = extract_domain(&email);

        let lat = fields.float("address.geo.lat");
        let lng = fields.float("address.geo.lng");

        Ok(ProcessedUser {
            user_id,
            username: fields.truncated("username", USERNAME_MAX_LEN),
            name: fields.truncated("name", NAME_MAX_LEN),
            email,
            phone: fields.truncated("phone", PHONE_MAX_LEN),
            website: fields.truncated("website", WEBSITE_MAX_LEN),
            city: fields.truncated("address.city", CITY_MAX_LEN),
            zipcode: fields.truncated("address.zipcode", ZIPCODE_MAX_LEN),
            has_coordinates: presence(&lat, &lng),
            lat,
            lng,
            company_name: fields.truncated("company.name", COMPANY_NAME_MAX_LEN),
            company_catchphrase: fields
                .text("company.catchPhrase")
                .map(Cow::into_owned)
                .unwrap_or_default(),
            email_domain,
            created_at: ctx.run_timestamp,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostTransformer;

impl RecordTransformer for PostTransformer {
    type Output = ProcessedPost;

    fn kind(&self) -> EntityKind {
        EntityKind::Post
    }

    fn transform(
        &self,
        raw: &RawRecord,
        ctx: &TransformContext,
        diagnostics: &mut FieldDiagnostics,
    ) -> Result<ProcessedPost, RejectReason> {
        let mut fields = Fields::new(raw, EntityKind::Post, diagnostics);
        let post_id = fields.id("id").ok_or(RejectReason::MissingId)?;
        let user_id = fields.id("userId").ok_or(RejectReason::MissingUserId)?;

        let title_raw = fields.text("title");
        let title = truncate(Some(strip_whitespace(title_raw.as_deref()).as_str()), TITLE_MAX_LEN);
        let body_raw = fields.text("body");
        let body = strip_whitespace(body_raw.as_deref());

        let body_length = character_count(&body);

        Ok(ProcessedPost {
            post_id,
            user_id,
            title_length: character_count(&title),
            body_length,
            word_count: word_count(&body),
            post_category: post_category(body_length),
            title,
            body,
            created_at: ctx.run_timestamp,
        })
    }
}

pub fn transform_user(
    raw: &RawRecord,
    ctx: &TransformContext,
) -> Result<ProcessedUser, RejectReason> {
    UserTransformer.transform(raw, ctx, &mut FieldDiagnostics::default())
}

pub fn transform_post(
    raw: &RawRecord,
    ctx: &TransformContext,
) -> Result<ProcessedPost, RejectReason> {
    PostTransformer.transform(raw, ctx, &mut FieldDiagnostics::default())
}
