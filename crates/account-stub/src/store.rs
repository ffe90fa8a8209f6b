//! In-memory account store implementing [`AccountRpc`].
//!
//! Accounts live in a `DashMap<i64, AccountRecord>` with a lower-cased email
//! index beside it. Credentials are stored as `salt$sha256(salt:password)`
//! and compared in constant time. Access, refresh, reset, and verification
//! tokens are opaque random strings held in their own maps.
//!
//! Tests can queue transport failures with [`InMemoryAccounts::inject_faults`]
//! and inspect every call through [`InMemoryAccounts::calls`].

use std::cmp::Ordering as CmpOrdering;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use account_client::operation::RpcOperation;
use account_client::rpc::{AccountRpc, CallContext, RpcCode, RpcStatus};
use account_client::types::*;
use account_core::{AccountStatus, Role, Secret, SortOrder};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// Lifetime of an access token, in seconds.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 3600;

/// Lifetime of a refresh token, in seconds.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 3600;

/// Sort keys accepted by list calls.
pub const SORT_FIELDS: [&str; 6] = ["id", "name", "email", "role", "created_at", "updated_at"];

#[derive(Debug, Clone, Copy)]
struct Grant {
    user_id: i64,
    expires_at: DateTime<Utc>,
}

/// One call observed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: RpcOperation,
    pub request_id: String,
    pub page: Option<PageRequest>,
}

/// Account to insert directly, bypassing registration.
#[derive(Debug, Clone)]
pub struct SeedAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub branch_id: i64,
    pub status: AccountStatus,
    pub email_verified: bool,
}

impl SeedAccount {
    pub fn new(name: &str, email: &str, password: &str, role: Role) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role,
            branch_id: 1,
            status: AccountStatus::Active,
            email_verified: true,
        }
    }

    pub fn branch(mut self, branch_id: i64) -> Self {
        self.branch_id = branch_id;
        self
    }

    pub fn status(mut self, status: AccountStatus) -> Self {
        self.status = status;
        self
    }

    pub fn unverified(mut self) -> Self {
        self.email_verified = false;
        self
    }
}

struct Inner {
    accounts: DashMap<i64, AccountRecord>,
    emails: DashMap<String, i64>,
    access_tokens: DashMap<String, Grant>,
    refresh_tokens: DashMap<String, Grant>,
    reset_tokens: DashMap<String, i64>,
    verification_tokens: DashMap<String, i64>,
    idempotent_registrations: DashMap<String, RegisterReply>,
    idempotent_creations: DashMap<String, i64>,
    next_id: AtomicI64,
    faults: Mutex<VecDeque<RpcCode>>,
    calls: Mutex<Vec<RecordedCall>>,
}

/// Shared in-memory backend. Clones share the same data.
#[derive(Clone)]
pub struct InMemoryAccounts {
    inner: Arc<Inner>,
}

impl Default for InMemoryAccounts {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAccounts {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                accounts: DashMap::new(),
                emails: DashMap::new(),
                access_tokens: DashMap::new(),
                refresh_tokens: DashMap::new(),
                reset_tokens: DashMap::new(),
                verification_tokens: DashMap::new(),
                idempotent_registrations: DashMap::new(),
                idempotent_creations: DashMap::new(),
                next_id: AtomicI64::new(1),
                faults: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
            }),
        }
    }

    // ── Test hooks ──────────────────────────────────────────────────

    /// Insert an account directly and return its stored record.
    pub fn seed(&self, seed: SeedAccount) -> AccountRecord {
        let now = Utc::now();
        let record = AccountRecord {
            id: self.inner.next_id.fetch_add(1, Ordering::SeqCst),
            branch_id: seed.branch_id,
            name: seed.name,
            email: seed.email,
            avatar: String::new(),
            title: String::new(),
            role: seed.role,
            owner_id: 0,
            status: seed.status,
            email_verified: seed.email_verified,
            password_hash: Some(hash_password(&seed.password)),
            created_at: now,
            updated_at: now,
        };
        self.insert(record.clone());
        record
    }

    /// Issue an access token for `user_id` without a login.
    pub fn issue_access_token(&self, user_id: i64) -> String {
        let token = opaque_token();
        self.inner.access_tokens.insert(
            token.clone(),
            Grant {
                user_id,
                expires_at: Utc::now() + Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            },
        );
        token
    }

    /// Pending password reset token for `email`, if one was requested.
    pub fn reset_token_for(&self, email: &str) -> Option<String> {
        let id = self.id_for_email(email)?;
        self.inner
            .reset_tokens
            .iter()
            .find(|entry| *entry.value() == id)
            .map(|entry| entry.key().clone())
    }

    /// Pending email verification token for `email`.
    pub fn verification_token_for(&self, email: &str) -> Option<String> {
        let id = self.id_for_email(email)?;
        self.inner
            .verification_tokens
            .iter()
            .find(|entry| *entry.value() == id)
            .map(|entry| entry.key().clone())
    }

    /// Fail the next calls with these codes, one per call, in order.
    pub fn inject_faults(&self, codes: &[RpcCode]) {
        self.inner.faults.lock().extend(codes.iter().copied());
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.calls.lock().clone()
    }

    pub fn call_count(&self, operation: RpcOperation) -> usize {
        self.inner
            .calls
            .lock()
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    pub fn account(&self, id: i64) -> Option<AccountRecord> {
        self.inner.accounts.get(&id).map(|r| r.value().clone())
    }

    // ── Internals ───────────────────────────────────────────────────

    fn begin(&self, ctx: &CallContext, operation: RpcOperation, page: Option<&PageRequest>) -> Result<(), RpcStatus> {
        self.inner.calls.lock().push(RecordedCall {
            operation,
            request_id: ctx.request_id.clone(),
            page: page.cloned(),
        });
        tracing::debug!(method = operation.method(), request_id = %ctx.request_id, "stub call");
        match self.inner.faults.lock().pop_front() {
            Some(code) => Err(RpcStatus::new(code, format!("injected fault for {}", operation.method()))),
            None => Ok(()),
        }
    }

    fn insert(&self, record: AccountRecord) {
        self.inner.emails.insert(record.email.to_lowercase(), record.id);
        self.inner.accounts.insert(record.id, record);
    }

    fn id_for_email(&self, email: &str) -> Option<i64> {
        self.inner.emails.get(&email.to_lowercase()).map(|id| *id)
    }

    fn record(&self, id: i64) -> Result<AccountRecord, RpcStatus> {
        self.inner
            .accounts
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| RpcStatus::not_found(format!("account {id} not found")))
    }

    fn new_account(
        &self,
        name: &str,
        email: &str,
        password: &Secret,
        role: Role,
        branch_id: i64,
    ) -> Result<AccountRecord, RpcStatus> {
        if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(RpcStatus::invalid_argument("name, email and password are required"));
        }
        if self.id_for_email(email).is_some() {
            return Err(RpcStatus::already_exists("email already registered"));
        }
        let now = Utc::now();
        let record = AccountRecord {
            id: self.inner.next_id.fetch_add(1, Ordering::SeqCst),
            branch_id,
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            avatar: String::new(),
            title: String::new(),
            role,
            owner_id: 0,
            status: AccountStatus::Active,
            email_verified: false,
            password_hash: Some(hash_password(password.expose())),
            created_at: now,
            updated_at: now,
        };
        self.insert(record.clone());
        self.inner.verification_tokens.insert(opaque_token(), record.id);
        Ok(record)
    }

    fn issue_pair(&self, user_id: i64) -> TokenPair {
        let now = Utc::now();
        let access = self.issue_access_token(user_id);
        let refresh = opaque_token();
        self.inner.refresh_tokens.insert(
            refresh.clone(),
            Grant {
                user_id,
                expires_at: now + Duration::seconds(REFRESH_TOKEN_TTL_SECS),
            },
        );
        TokenPair {
            access_token: Secret::new(access),
            refresh_token: Secret::new(refresh),
            expires_at: now + Duration::seconds(ACCESS_TOKEN_TTL_SECS),
        }
    }

    fn list(&self, page: &PageRequest, filter: impl Fn(&AccountRecord) -> bool) -> Result<AccountList, RpcStatus> {
        if page.page == 0 || page.page_size == 0 {
            return Err(RpcStatus::invalid_argument("page and page_size must be positive"));
        }
        if !SORT_FIELDS.contains(&page.sort_by.as_str()) {
            return Err(RpcStatus::invalid_argument(format!("unsupported sort field {}", page.sort_by)));
        }
        let mut matched: Vec<AccountRecord> = self
            .inner
            .accounts
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_by(|a, b| {
            let ord = compare(a, b, &page.sort_by);
            match page.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        let total = matched.len() as u64;
        let skip = (page.page as usize - 1) * page.page_size as usize;
        let accounts = matched
            .into_iter()
            .skip(skip)
            .take(page.page_size as usize)
            .collect();
        Ok(AccountList { accounts, total })
    }

    fn grant(map: &DashMap<String, Grant>, token: &str) -> Option<Grant> {
        map.get(token)
            .map(|g| *g.value())
            .filter(|g| g.expires_at > Utc::now())
    }
}

fn compare(a: &AccountRecord, b: &AccountRecord, field: &str) -> CmpOrdering {
    match field {
        "id" => a.id.cmp(&b.id),
        "name" => a.name.cmp(&b.name),
        "email" => a.email.cmp(&b.email),
        "role" => a.role.cmp(&b.role),
        "updated_at" => a.updated_at.cmp(&b.updated_at),
        _ => a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)),
    }
}

fn opaque_token() -> String {
    Uuid::new_v4().simple().to_string()
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// Salted SHA-256 credential hash: `salt$hexdigest`.
pub fn hash_password(password: &str) -> Secret {
    let salt = Uuid::new_v4().simple().to_string();
    let hex = digest(&salt, password);
    Secret::new(format!("{salt}${hex}"))
}

/// Constant-time check of `password` against a stored hash.
pub fn verify_password(stored: &Secret, password: &str) -> bool {
    let Some((salt, expected)) = stored.expose().split_once('$') else {
        return false;
    };
    let actual = digest(salt, password);
    actual.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[async_trait]
impl AccountRpc for InMemoryAccounts {
    async fn register(&self, ctx: &CallContext, req: RegisterRequest) -> Result<RegisterReply, RpcStatus> {
        self.begin(ctx, RpcOperation::Register, None)?;
        if let Some(key) = &req.idempotency_key {
            if let Some(reply) = self.inner.idempotent_registrations.get(key) {
                return Ok(reply.value().clone());
            }
        }
        let record = self.new_account(&req.name, &req.email, &req.password, Role::Student, 1)?;
        let reply = RegisterReply {
            id: record.id,
            name: record.name,
            email: record.email,
            success: true,
        };
        if let Some(key) = req.idempotency_key {
            self.inner.idempotent_registrations.insert(key, reply.clone());
        }
        Ok(reply)
    }

    async fn login(&self, ctx: &CallContext, req: LoginRequest) -> Result<LoginReply, RpcStatus> {
        self.begin(ctx, RpcOperation::Login, None)?;
        let account = self
            .id_for_email(&req.email)
            .and_then(|id| self.record(id).ok())
            .ok_or_else(|| RpcStatus::unauthenticated("invalid credentials"))?;
        let matches = account
            .password_hash
            .as_ref()
            .is_some_and(|stored| verify_password(stored, req.password.expose()));
        if !matches {
            return Err(RpcStatus::unauthenticated("invalid credentials"));
        }
        let tokens = self.issue_pair(account.id);
        Ok(LoginReply { account, tokens })
    }

    async fn logout(&self, ctx: &CallContext, req: LogoutRequest) -> Result<Ack, RpcStatus> {
        self.begin(ctx, RpcOperation::Logout, None)?;
        if let Some(token) = req.refresh_token {
            self.inner.refresh_tokens.remove(token.expose());
        }
        Ok(Ack::ok("logged out"))
    }

    async fn refresh_token(&self, ctx: &CallContext, req: RefreshTokenRequest) -> Result<TokenPair, RpcStatus> {
        self.begin(ctx, RpcOperation::RefreshToken, None)?;
        let grant = Self::grant(&self.inner.refresh_tokens, req.refresh_token.expose())
            .ok_or_else(|| RpcStatus::unauthenticated("refresh token invalid or expired"))?;
        self.inner.refresh_tokens.remove(req.refresh_token.expose());
        Ok(self.issue_pair(grant.user_id))
    }

    async fn validate_token(
        &self,
        ctx: &CallContext,
        req: ValidateTokenRequest,
    ) -> Result<ValidateTokenReply, RpcStatus> {
        self.begin(ctx, RpcOperation::ValidateToken, None)?;
        let grant = Self::grant(&self.inner.access_tokens, req.token.expose())
            .ok_or_else(|| RpcStatus::unauthenticated("token invalid or expired"))?;
        Ok(ValidateTokenReply {
            valid: true,
            user_id: grant.user_id,
            expires_at: grant.expires_at,
            message: "token is valid".to_string(),
        })
    }

    async fn create_user(&self, ctx: &CallContext, req: CreateUserRequest) -> Result<AccountRecord, RpcStatus> {
        self.begin(ctx, RpcOperation::CreateUser, None)?;
        if let Some(key) = &req.idempotency_key {
            let existing = self.inner.idempotent_creations.get(key).map(|id| *id);
            if let Some(id) = existing {
                return self.record(id);
            }
        }
        let mut record = self.new_account(&req.name, &req.email, &req.password, req.role, req.branch_id)?;
        record.avatar = req.avatar;
        record.title = req.title;
        record.owner_id = req.owner_id;
        self.inner.accounts.insert(record.id, record.clone());
        if let Some(key) = req.idempotency_key {
            self.inner.idempotent_creations.insert(key, record.id);
        }
        Ok(record)
    }

    async fn find_by_id(&self, ctx: &CallContext, req: FindByIdRequest) -> Result<AccountRecord, RpcStatus> {
        self.begin(ctx, RpcOperation::FindById, None)?;
        self.record(req.id)
    }

    async fn find_by_email(&self, ctx: &CallContext, req: FindByEmailRequest) -> Result<AccountRecord, RpcStatus> {
        self.begin(ctx, RpcOperation::FindByEmail, None)?;
        let id = self
            .id_for_email(&req.email)
            .ok_or_else(|| RpcStatus::not_found("no account with that email"))?;
        self.record(id)
    }

    async fn find_by_role(&self, ctx: &CallContext, req: FindByRoleRequest) -> Result<AccountList, RpcStatus> {
        self.begin(ctx, RpcOperation::FindByRole, Some(&req.page))?;
        self.list(&req.page, |a| a.role == req.role)
    }

    async fn find_by_branch(&self, ctx: &CallContext, req: FindByBranchRequest) -> Result<AccountList, RpcStatus> {
        self.begin(ctx, RpcOperation::FindByBranch, Some(&req.page))?;
        self.list(&req.page, |a| a.branch_id == req.branch_id)
    }

    async fn update_user(&self, ctx: &CallContext, req: UpdateUserRequest) -> Result<AccountRecord, RpcStatus> {
        self.begin(ctx, RpcOperation::UpdateUser, None)?;
        let mut record = self.record(req.id)?;
        if let Some(email) = req.email {
            if !email.eq_ignore_ascii_case(&record.email) {
                if self.id_for_email(&email).is_some() {
                    return Err(RpcStatus::already_exists("email already registered"));
                }
                self.inner.emails.remove(&record.email.to_lowercase());
                record.email = email;
            }
        }
        if let Some(name) = req.name {
            record.name = name;
        }
        if let Some(branch_id) = req.branch_id {
            record.branch_id = branch_id;
        }
        if let Some(avatar) = req.avatar {
            record.avatar = avatar;
        }
        if let Some(title) = req.title {
            record.title = title;
        }
        if let Some(role) = req.role {
            record.role = role;
        }
        if let Some(owner_id) = req.owner_id {
            record.owner_id = owner_id;
        }
        record.updated_at = Utc::now();
        self.insert(record.clone());
        Ok(record)
    }

    async fn delete_user(&self, ctx: &CallContext, req: DeleteUserRequest) -> Result<Ack, RpcStatus> {
        self.begin(ctx, RpcOperation::DeleteUser, None)?;
        let (_, record) = self
            .inner
            .accounts
            .remove(&req.id)
            .ok_or_else(|| RpcStatus::not_found(format!("account {} not found", req.id)))?;
        self.inner.emails.remove(&record.email.to_lowercase());
        self.inner.access_tokens.retain(|_, g| g.user_id != req.id);
        self.inner.refresh_tokens.retain(|_, g| g.user_id != req.id);
        Ok(Ack::ok("account deleted"))
    }

    async fn find_all_users(&self, ctx: &CallContext, req: ListUsersRequest) -> Result<AccountList, RpcStatus> {
        self.begin(ctx, RpcOperation::FindAllUsers, Some(&req.page))?;
        self.list(&req.page, |_| true)
    }

    async fn search_users(&self, ctx: &CallContext, req: SearchUsersRequest) -> Result<AccountList, RpcStatus> {
        self.begin(ctx, RpcOperation::SearchUsers, Some(&req.page))?;
        let query = req.query.as_deref().map(str::to_lowercase);
        self.list(&req.page, |a| {
            let text_match = query.as_deref().map_or(true, |q| {
                a.name.to_lowercase().contains(q) || a.email.to_lowercase().contains(q)
            });
            text_match
                && req.role.map_or(true, |r| a.role == r)
                && req.branch_id.map_or(true, |b| a.branch_id == b)
                && (req.statuses.is_empty() || req.statuses.contains(&a.status))
        })
    }

    async fn change_password(&self, ctx: &CallContext, req: ChangePasswordRequest) -> Result<Ack, RpcStatus> {
        self.begin(ctx, RpcOperation::ChangePassword, None)?;
        let mut record = self.record(req.user_id)?;
        let current_ok = record
            .password_hash
            .as_ref()
            .is_some_and(|stored| verify_password(stored, req.current_password.expose()));
        if !current_ok {
            return Err(RpcStatus::unauthenticated("current password is incorrect"));
        }
        record.password_hash = Some(hash_password(req.new_password.expose()));
        record.updated_at = Utc::now();
        self.inner.accounts.insert(record.id, record);
        Ok(Ack::ok("password changed"))
    }

    async fn forgot_password(&self, ctx: &CallContext, req: ForgotPasswordRequest) -> Result<Ack, RpcStatus> {
        self.begin(ctx, RpcOperation::ForgotPassword, None)?;
        if let Some(id) = self.id_for_email(&req.email) {
            self.inner.reset_tokens.retain(|_, owner| *owner != id);
            self.inner.reset_tokens.insert(opaque_token(), id);
        }
        Ok(Ack::ok("reset instructions sent if the account exists"))
    }

    async fn reset_password(&self, ctx: &CallContext, req: ResetPasswordRequest) -> Result<Ack, RpcStatus> {
        self.begin(ctx, RpcOperation::ResetPassword, None)?;
        let (_, id) = self
            .inner
            .reset_tokens
            .remove(req.token.expose())
            .ok_or_else(|| RpcStatus::invalid_argument("reset token invalid or expired"))?;
        let mut record = self.record(id)?;
        record.password_hash = Some(hash_password(req.new_password.expose()));
        record.updated_at = Utc::now();
        self.inner.accounts.insert(record.id, record);
        Ok(Ack::ok("password reset"))
    }

    async fn verify_email(&self, ctx: &CallContext, req: VerifyEmailRequest) -> Result<Ack, RpcStatus> {
        self.begin(ctx, RpcOperation::VerifyEmail, None)?;
        let (_, id) = self
            .inner
            .verification_tokens
            .remove(req.token.expose())
            .ok_or_else(|| RpcStatus::invalid_argument("verification token invalid or expired"))?;
        let mut record = self.record(id)?;
        record.email_verified = true;
        record.updated_at = Utc::now();
        self.inner.accounts.insert(record.id, record);
        Ok(Ack::ok("email verified"))
    }

    async fn resend_verification(
        &self,
        ctx: &CallContext,
        req: ResendVerificationRequest,
    ) -> Result<Ack, RpcStatus> {
        self.begin(ctx, RpcOperation::ResendVerification, None)?;
        if let Some(id) = self.id_for_email(&req.email) {
            let verified = self.record(id).map(|r| r.email_verified).unwrap_or(true);
            if !verified {
                self.inner.verification_tokens.retain(|_, owner| *owner != id);
                self.inner.verification_tokens.insert(opaque_token(), id);
            }
        }
        Ok(Ack::ok("verification sent if the account exists"))
    }

    async fn update_account_status(
        &self,
        ctx: &CallContext,
        req: UpdateAccountStatusRequest,
    ) -> Result<AccountRecord, RpcStatus> {
        self.begin(ctx, RpcOperation::UpdateAccountStatus, None)?;
        let mut record = self.record(req.id)?;
        record.status = req.status;
        record.updated_at = Utc::now();
        self.inner.accounts.insert(record.id, record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> CallContext {
        CallContext::new("stub-test")
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Ada".into(),
            email: email.into(),
            password: Secret::from("Abcdef1!"),
            idempotency_key: None,
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let stored = hash_password("Abcdef1!");
        assert!(verify_password(&stored, "Abcdef1!"));
        assert!(!verify_password(&stored, "abcdef1!"));
        assert!(!stored.expose().contains("Abcdef1!"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password(&Secret::from("nodollar"), "x"));
    }

    #[tokio::test]
    async fn duplicate_email_is_already_exists() {
        let store = InMemoryAccounts::new();
        store.register(&ctx(), register_request("a@b.co")).await.unwrap();
        let err = store.register(&ctx(), register_request("A@B.co")).await.unwrap_err();
        assert_eq!(err.code, RpcCode::AlreadyExists);
    }

    #[tokio::test]
    async fn idempotent_register_replays_first_reply() {
        let store = InMemoryAccounts::new();
        let mut req = register_request("a@b.co");
        req.idempotency_key = Some("k".into());
        let first = store.register(&ctx(), req.clone()).await.unwrap();
        let second = store.register(&ctx(), req).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn login_checks_password() {
        let store = InMemoryAccounts::new();
        store.seed(SeedAccount::new("Ada", "ada@example.com", "Abcdef1!", Role::Student));
        let ok = store
            .login(
                &ctx(),
                LoginRequest {
                    email: "ada@example.com".into(),
                    password: Secret::from("Abcdef1!"),
                },
            )
            .await
            .unwrap();
        assert!(!ok.tokens.access_token.is_empty());

        let err = store
            .login(
                &ctx(),
                LoginRequest {
                    email: "ada@example.com".into(),
                    password: Secret::from("wrong"),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, RpcCode::Unauthenticated);
    }

    #[tokio::test]
    async fn refresh_rotates_tokens() {
        let store = InMemoryAccounts::new();
        let account = store.seed(SeedAccount::new("Ada", "ada@example.com", "Abcdef1!", Role::Student));
        let pair = store.issue_pair(account.id);
        let rotated = store
            .refresh_token(
                &ctx(),
                RefreshTokenRequest {
                    refresh_token: pair.refresh_token.clone(),
                },
            )
            .await
            .unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);
        let reuse = store
            .refresh_token(
                &ctx(),
                RefreshTokenRequest {
                    refresh_token: pair.refresh_token,
                },
            )
            .await;
        assert!(reuse.is_err());
    }

    #[tokio::test]
    async fn list_paginates_and_sorts() {
        let store = InMemoryAccounts::new();
        for i in 0..15 {
            store.seed(SeedAccount::new(&format!("user{i:02}"), &format!("u{i}@example.com"), "Abcdef1!", Role::Student));
        }
        let page = PageRequest {
            page: 2,
            page_size: 10,
            sort_by: "name".into(),
            sort_order: SortOrder::Asc,
        };
        let list = store
            .find_all_users(&ctx(), ListUsersRequest { page: page.clone() })
            .await
            .unwrap();
        assert_eq!(list.total, 15);
        assert_eq!(list.accounts.len(), 5);
        assert_eq!(list.accounts[0].name, "user10");
        assert_eq!(store.calls().last().unwrap().page, Some(page));
    }

    #[tokio::test]
    async fn injected_faults_are_returned_in_order() {
        let store = InMemoryAccounts::new();
        store.inject_faults(&[RpcCode::Unavailable, RpcCode::Internal]);
        let first = store.find_by_id(&ctx(), FindByIdRequest { id: 1 }).await.unwrap_err();
        let second = store.find_by_id(&ctx(), FindByIdRequest { id: 1 }).await.unwrap_err();
        let third = store.find_by_id(&ctx(), FindByIdRequest { id: 1 }).await.unwrap_err();
        assert_eq!(first.code, RpcCode::Unavailable);
        assert_eq!(second.code, RpcCode::Internal);
        assert_eq!(third.code, RpcCode::NotFound);
        assert_eq!(store.call_count(RpcOperation::FindById), 3);
    }

    #[tokio::test]
    async fn reset_token_is_single_use() {
        let store = InMemoryAccounts::new();
        store.seed(SeedAccount::new("Ada", "ada@example.com", "Abcdef1!", Role::Student));
        store
            .forgot_password(&ctx(), ForgotPasswordRequest { email: "ada@example.com".into() })
            .await
            .unwrap();
        let token = store.reset_token_for("ada@example.com").unwrap();
        let req = ResetPasswordRequest {
            token: Secret::new(token),
            new_password: Secret::from("Newpass1!"),
        };
        store.reset_password(&ctx(), req.clone()).await.unwrap();
        assert!(store.reset_password(&ctx(), req).await.is_err());
    }
}
