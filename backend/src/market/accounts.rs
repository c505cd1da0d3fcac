use super::adapter::{Clock, StorageAdapter};
use super::{Marketplace, keys, require_admin};
use crate::error::{MarketError, MarketResult};
use crate::utils::secret::{hash_password, verify_password};
use serde::{Deserialize, Serialize};
use tripfin_shared::protocol::{Ack, AuthResponse, LoginRequest, Profile, SignupRequest};
use tripfin_shared::{
    ApprovalStatus, NotificationPriority, NotificationType, Role, Timestamp, User,
};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Credential {
    user_id: String,
    salt: String,
    hash: String,
    rounds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Session {
    user_id: String,
    expires_at: Timestamp,
}

fn normalize_email(raw: &str) -> MarketResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(MarketError::invalid_input("A valid email address is required"));
    }
    Ok(email)
}

impl<S, C> Marketplace<S, C>
where
    S: StorageAdapter,
    C: Clock,
{
    // =========================================================
    // 注册 / 登录 / 会话
    // =========================================================

    pub async fn signup(&self, req: SignupRequest) -> MarketResult<AuthResponse> {
        let email = normalize_email(&req.email)?;
        if req.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(MarketError::invalid_input(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        let name = req.name.trim();
        if name.is_empty() {
            return Err(MarketError::invalid_input("Name is required"));
        }

        let cred_key = keys::credential(&email);
        if self.storage.get::<Credential>(&cred_key).await?.is_some() {
            return Err(MarketError::conflict("Email already registered").in_op("accounts.signup"));
        }

        let is_super_admin = self.config.super_admin_email.as_deref() == Some(email.as_str());
        let role = if is_super_admin {
            Role::SuperAdmin
        } else {
            match req.role.unwrap_or(Role::LoadOwner) {
                r if r.is_admin() => {
                    return Err(MarketError::invalid_input("Admin roles cannot be self-assigned"));
                }
                r => r,
            }
        };
        let approval_status = if role == Role::Lender {
            ApprovalStatus::Pending
        } else {
            ApprovalStatus::Approved
        };

        let seq = self.next_seq("user").await?;
        let user = User {
            id: Self::new_id(),
            user_id: format!("USR{:06}", seq),
            email: email.clone(),
            name: name.to_string(),
            phone: req.phone.trim().to_string(),
            role,
            company: req.company.filter(|c| !c.trim().is_empty()),
            approval_status,
            rejection_reason: None,
            approved_by: None,
            created_at: self.now(),
        };

        let salt = Self::new_id();
        let credential = Credential {
            user_id: user.id.clone(),
            hash: hash_password(&salt, &req.password, self.config.password_hash_rounds),
            salt,
            rounds: self.config.password_hash_rounds,
        };
        self.storage.put(&cred_key, &credential).await?;
        self.save_user(&user).await?;
        if is_super_admin {
            self.storage.put(keys::SUPER_ADMIN, &user.id).await?;
        }
        let wallet = self.wallet(&user.id).await?;
        let token = self.open_session(&user.id).await?;

        log_info!("[accounts] signup user={} role={}", user.user_id, role.as_str());
        Ok(AuthResponse { user, wallet, token })
    }

    pub async fn login(&self, req: LoginRequest) -> MarketResult<AuthResponse> {
        let invalid = || MarketError::unauthorized("Invalid email or password");
        let email = normalize_email(&req.email).map_err(|_| invalid())?;
        let credential: Credential = self
            .storage
            .get(&keys::credential(&email))
            .await?
            .ok_or_else(invalid)?;
        if !verify_password(
            &credential.salt,
            &req.password,
            credential.rounds,
            &credential.hash,
        ) {
            return Err(invalid());
        }

        let user = self.load_user(&credential.user_id).await?;
        let wallet = self.wallet(&user.id).await?;
        let token = self.open_session(&user.id).await?;
        Ok(AuthResponse { user, wallet, token })
    }

    async fn open_session(&self, user_id: &str) -> MarketResult<String> {
        let token = Self::new_id();
        let session = Session {
            user_id: user_id.to_string(),
            expires_at: self.now().add_hours(self.config.session_ttl_hours),
        };
        self.storage.put(&keys::session(&token), &session).await?;
        Ok(token)
    }

    /// 解析 Bearer token 对应的用户
    pub async fn authenticate(&self, token: Option<&str>) -> MarketResult<User> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MarketError::unauthorized("Authentication required"))?;
        let key = keys::session(token);
        let session: Session = self
            .storage
            .get(&key)
            .await?
            .ok_or_else(|| MarketError::unauthorized("Invalid or expired session"))?;
        if session.expires_at <= self.now() {
            self.storage.delete(&key).await?;
            return Err(MarketError::unauthorized("Invalid or expired session"));
        }
        self.load_user(&session.user_id)
            .await
            .map_err(|_| MarketError::unauthorized("Invalid or expired session"))
    }

    /// 删除所有已过期会话，返回删除数量；由定期清扫调用
    pub(super) async fn purge_expired_sessions(&self) -> MarketResult<usize> {
        let now = self.now();
        let sessions: Vec<(String, Session)> = self.storage.list(keys::SESSION).await?;
        let mut purged = 0;
        for (key, session) in sessions {
            if session.expires_at <= now {
                self.storage.delete(&key).await?;
                purged += 1;
            }
        }
        if purged > 0 {
            log_info!("[accounts] purged {} expired session(s)", purged);
        }
        Ok(purged)
    }

    pub(super) async fn has_sessions(&self) -> MarketResult<bool> {
        let sessions: Vec<(String, Session)> = self.storage.list(keys::SESSION).await?;
        Ok(!sessions.is_empty())
    }

    pub async fn logout(&self, token: Option<&str>) -> MarketResult<Ack> {
        if let Some(token) = token {
            self.storage.delete(&keys::session(token)).await?;
        }
        Ok(Ack::ok("Logged out"))
    }

    pub async fn profile(&self, actor: &User) -> MarketResult<Profile> {
        Ok(Profile {
            user: actor.clone(),
            wallet: self.wallet(&actor.id).await?,
        })
    }

    /// 切换到 lender 需要重新审核；借款方角色与注册时一样直接通过
    pub async fn change_role(&self, actor: &User, role: Role) -> MarketResult<User> {
        if role.is_admin() {
            return Err(MarketError::invalid_input("Admin roles cannot be self-assigned"));
        }
        if actor.role.is_admin() {
            return Err(MarketError::forbidden("Administrators cannot change their role"));
        }
        let mut user = self.load_user(&actor.id).await?;
        if user.role == role {
            return Ok(user);
        }
        user.approved_by = None;
        if role == Role::Lender {
            user.approval_status = ApprovalStatus::Pending;
        } else {
            user.approval_status = ApprovalStatus::Approved;
            user.rejection_reason = None;
        }
        user.role = role;
        self.save_user(&user).await?;
        Ok(user)
    }

    // =========================================================
    // 用户管理 (admin)
    // =========================================================

    pub async fn list_users(&self, actor: &User, role: Option<Role>) -> MarketResult<Vec<User>> {
        require_admin(actor)?;
        let users = self.all_users().await?;
        Ok(users
            .into_iter()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .collect())
    }

    pub async fn pending_approvals(&self, actor: &User) -> MarketResult<Vec<User>> {
        require_admin(actor)?;
        let users = self.all_users().await?;
        Ok(users
            .into_iter()
            .filter(|u| u.approval_status == ApprovalStatus::Pending)
            .collect())
    }

    pub async fn approve_user(&self, actor: &User, user_id: &str) -> MarketResult<User> {
        require_admin(actor)?;
        let mut user = self.load_user(user_id).await?;
        user.approval_status = ApprovalStatus::Approved;
        user.approved_by = Some(actor.id.clone());
        user.rejection_reason = None;
        self.save_user(&user).await?;

        self.notify(
            &user.id,
            NotificationType::AccountApproved,
            "Account approved",
            "Your account has been approved. You can now use the platform.".to_string(),
            NotificationPriority::High,
            Some("/dashboard".to_string()),
        )
        .await?;
        Ok(user)
    }

    pub async fn reject_user(&self, actor: &User, user_id: &str, reason: &str) -> MarketResult<User> {
        require_admin(actor)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(MarketError::invalid_input("Rejection reason is required"));
        }
        let mut user = self.load_user(user_id).await?;
        user.approval_status = ApprovalStatus::Rejected;
        user.rejection_reason = Some(reason.to_string());
        user.approved_by = None;
        self.save_user(&user).await?;

        self.notify(
            &user.id,
            NotificationType::AccountRejected,
            "Account rejected",
            format!("Your account application was rejected: {}", reason),
            NotificationPriority::High,
            None,
        )
        .await?;
        Ok(user)
    }

    /// 平台费收款钱包：super admin，否则平台账户
    pub(super) async fn fee_recipient(&self) -> MarketResult<String> {
        Ok(self
            .storage
            .get::<String>(keys::SUPER_ADMIN)
            .await?
            .unwrap_or_else(|| keys::TREASURY.to_string()))
    }
}

#[cfg(test)]
mod tests;
