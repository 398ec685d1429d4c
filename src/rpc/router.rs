// Method router: maps `"service.Method"` names onto the handlers and turns
// every outcome into a response envelope.

use crate::core::blocklist::{BlocklistService, BlocklistStore};
use crate::core::delegation::{DelegationResolver, DelegationStore};
use crate::core::errors::{ErrorClass, ModerationError};
use crate::core::muted_words::{MutedWordService, MutedWordStore};
use crate::core::screening::ScreeningService;
use crate::rpc::handlers::{blockedlist, filter, moderation, settings};
use crate::rpc::protocol::{Request, Response};
use serde_json::Value;
use std::sync::Arc;

pub const METHODS: &[&str] = &[
    "moderation.AmI",
    "moderation.AddDelegate",
    "moderation.RemoveDelegate",
    "moderation.ListDelegates",
    "moderation.Block",
    "moderation.UnBlock",
    "blockedlist.Update",
    "blockedlist.Invite",
    "blockedlist.Accept",
    "blockedlist.Rescind",
    "blockedlist.Get",
    "settings.BlockWord",
    "settings.UnBlockWord",
    "settings.ListBlockedWords",
    "filter.ScreenComment",
    "filter.ScreenReaction",
];

pub struct Router<D: DelegationStore, B: BlocklistStore, M: MutedWordStore> {
    delegation: Arc<DelegationResolver<D>>,
    blocklists: Arc<BlocklistService<B>>,
    muted_words: Arc<MutedWordService<M>>,
    screening: Arc<ScreeningService<B, M>>,
}

impl<D: DelegationStore, B: BlocklistStore, M: MutedWordStore> Router<D, B, M> {
    pub fn new(
        delegation: Arc<DelegationResolver<D>>,
        blocklists: Arc<BlocklistService<B>>,
        muted_words: Arc<MutedWordService<M>>,
        screening: Arc<ScreeningService<B, M>>,
    ) -> Self {
        Self {
            delegation,
            blocklists,
            muted_words,
            screening,
        }
    }

    pub async fn handle(&self, request: Request) -> Response {
        match self.dispatch(&request.method, request.params).await {
            Ok(result) => Response::ok(request.id, result),
            Err(err) => {
                match err.class() {
                    ErrorClass::Server => tracing::error!(
                        method = %request.method,
                        retryable = err.is_retryable(),
                        "Request failed: {}",
                        err
                    ),
                    _ => tracing::warn!(method = %request.method, "Request rejected: {}", err),
                }
                Response::err(request.id, &err)
            }
        }
    }

    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, ModerationError> {
        tracing::debug!(method, "Dispatching request");
        match method {
            "moderation.AmI" => moderation::am_i(&self.delegation, params).await,
            "moderation.AddDelegate" => moderation::add_delegate(&self.delegation, params).await,
            "moderation.RemoveDelegate" => {
                moderation::remove_delegate(&self.delegation, params).await
            }
            "moderation.ListDelegates" => {
                moderation::list_delegates(&self.delegation, params).await
            }
            "moderation.Block" => moderation::block(&self.blocklists, params).await,
            "moderation.UnBlock" => moderation::unblock(&self.blocklists, params).await,

            "blockedlist.Update" => blockedlist::update(&self.blocklists, params).await,
            "blockedlist.Invite" => blockedlist::invite(&self.blocklists, params).await,
            "blockedlist.Accept" => blockedlist::accept(&self.blocklists, params).await,
            "blockedlist.Rescind" => blockedlist::rescind(&self.blocklists, params).await,
            "blockedlist.Get" => blockedlist::get(&self.blocklists, params).await,

            "settings.BlockWord" => settings::block_word(&self.muted_words, params).await,
            "settings.UnBlockWord" => settings::unblock_word(&self.muted_words, params).await,
            "settings.ListBlockedWords" => {
                settings::list_blocked_words(&self.muted_words, params).await
            }

            "filter.ScreenComment" => filter::screen_comment(&self.screening, params).await,
            "filter.ScreenReaction" => filter::screen_reaction(&self.screening, params),

            other => Err(ModerationError::NotFound(format!("unknown method {}", other))),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::blocklist::BlocklistDefaults;
    use crate::core::channels::channel_auth::tests::{sign, MockVerifier};
    use crate::core::channels::{Authorization, ChannelAuthenticator};
    use crate::core::spam::SpamRegistry;
    use crate::infra::blocklist::SqliteBlocklistStore;
    use crate::infra::channels::SqliteChannelDirectory;
    use crate::infra::database::tests::temp_pool;
    use crate::infra::delegation::SqliteDelegationStore;
    use crate::infra::muted_words::SqliteMutedWordStore;
    use serde_json::json;
    use tempfile::TempDir;

    pub type TestRouter = Router<SqliteDelegationStore, SqliteBlocklistStore, SqliteMutedWordStore>;

    pub const OWNER: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    pub const MEMBER: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const MODERATOR: &str = "cccccccccccccccccccccccccccccccccccccccc";
    const SPAMMER: &str = "dddddddddddddddddddddddddddddddddddddddd";
    const GLOBAL: &str = "ffffffffffffffffffffffffffffffffffffffff";

    /// Full stack on a temporary SQLite file.
    pub async fn router() -> (TempDir, TestRouter) {
        let (dir, pool) = temp_pool().await;

        let directory = SqliteChannelDirectory::new(pool.clone());
        directory.migrate().await.unwrap();
        let delegation_store = SqliteDelegationStore::new(pool.clone());
        delegation_store.migrate().await.unwrap();
        let blocklist_store = SqliteBlocklistStore::new(pool.clone());
        blocklist_store.migrate().await.unwrap();
        let muted_word_store = SqliteMutedWordStore::new(pool);
        muted_word_store.migrate().await.unwrap();

        let auth = Arc::new(ChannelAuthenticator::new(
            Arc::new(directory),
            Arc::new(MockVerifier),
        ));
        let delegation = Arc::new(DelegationResolver::new(delegation_store, auth.clone()));
        delegation
            .seed_global_moderators(&[GLOBAL.to_string()])
            .await
            .unwrap();
        let blocklists = Arc::new(BlocklistService::new(
            blocklist_store,
            auth.clone(),
            delegation.clone(),
            BlocklistDefaults::default(),
        ));
        let muted_words = Arc::new(MutedWordService::new(muted_word_store, auth));
        let screening = Arc::new(ScreeningService::new(
            Arc::new(SpamRegistry::new(vec![SPAMMER.to_string()], Vec::new())),
            blocklists.clone(),
            muted_words.clone(),
        ));

        (dir, Router::new(delegation, blocklists, muted_words, screening))
    }

    fn signed(auth: Authorization, extra: Value) -> Value {
        let mut params = serde_json::to_value(auth).unwrap();
        if let (Some(params), Some(extra)) = (params.as_object_mut(), extra.as_object()) {
            params.extend(extra.clone());
        }
        params
    }

    pub async fn call(router: &TestRouter, method: &str, params: Value) -> Response {
        router
            .handle(Request {
                id: json!(1),
                method: method.to_string(),
                params,
            })
            .await
    }

    fn result(response: Response) -> Value {
        match (response.result, response.error) {
            (Some(result), None) => result,
            other => panic!("expected a result, got {:?}", other),
        }
    }

    fn error_code(response: Response) -> u16 {
        response.error.expect("expected an error").code
    }

    #[tokio::test]
    async fn test_every_method_is_routed() {
        let (_dir, router) = router().await;
        for method in METHODS {
            let response = call(&router, method, json!({})).await;
            // Empty params may be rejected, but never as an unknown method
            if let Some(error) = response.error {
                assert_ne!(error.message, format!("Not found: unknown method {}", method));
            }
        }
        assert_eq!(error_code(call(&router, "moderation.Nope", json!({})).await), 404);
    }

    #[tokio::test]
    async fn test_am_i_scopes() {
        let (_dir, router) = router().await;

        let me = result(call(&router, "moderation.AmI", signed(sign(MODERATOR, "@mod"), json!({}))).await);
        assert_eq!(me["type"], "Channel");
        assert_eq!(me["authorized_channels"], json!({}));

        let added = call(
            &router,
            "moderation.AddDelegate",
            signed(
                sign(OWNER, "@owner"),
                json!({"mod_channel_id": MODERATOR, "mod_channel_name": "@mod"}),
            ),
        )
        .await;
        assert_eq!(result(added)["delegates"][0]["channel_id"], MODERATOR);

        let me = result(call(&router, "moderation.AmI", signed(sign(MODERATOR, "@mod"), json!({}))).await);
        assert_eq!(me["type"], "Channel");
        assert_eq!(me["authorized_channels"]["@owner"], OWNER);

        let global = result(call(&router, "moderation.AmI", signed(sign(GLOBAL, "@global"), json!({}))).await);
        assert_eq!(global["type"], "Global");
    }

    #[tokio::test]
    async fn test_forged_signature_is_401() {
        let (_dir, router) = router().await;
        let mut forged = sign(OWNER, "@owner");
        forged.channel_name = "@someone-else".to_string();

        let response = call(&router, "blockedlist.Update", signed(forged, json!({"name": "x"}))).await;
        assert_eq!(error_code(response), 401);
    }

    #[tokio::test]
    async fn test_channel_names_only_change_when_signed() {
        let (_dir, router) = router().await;
        call(
            &router,
            "moderation.AddDelegate",
            signed(
                sign(OWNER, "@owner"),
                json!({"mod_channel_id": MODERATOR, "mod_channel_name": "@mod"}),
            ),
        )
        .await;

        // Bad signature: rejected, and the stored name is untouched
        let mut forged = sign(OWNER, "@owner");
        forged.channel_name = "@pwned".to_string();
        let response = call(&router, "blockedlist.Update", signed(forged, json!({}))).await;
        assert_eq!(error_code(response), 401);

        // Referencing someone else's channel does not rename it either
        let blocked = call(
            &router,
            "moderation.Block",
            signed(
                sign(MEMBER, "@member"),
                json!({"blocked_channel_id": OWNER, "blocked_channel_name": "@renamed"}),
            ),
        )
        .await;
        assert_eq!(result(blocked)["blocked_channel_name"], "@owner");

        let me = result(call(&router, "moderation.AmI", signed(sign(MODERATOR, "@mod"), json!({}))).await);
        assert_eq!(me["authorized_channels"], json!({"@owner": OWNER}));
    }

    #[tokio::test]
    async fn test_delegate_of_creators_sharing_a_name() {
        let (_dir, router) = router().await;
        for creator in [OWNER, MEMBER] {
            call(
                &router,
                "moderation.AddDelegate",
                signed(
                    sign(creator, "@same"),
                    json!({"mod_channel_id": MODERATOR, "mod_channel_name": "@mod"}),
                ),
            )
            .await;
        }

        for creator in [OWNER, MEMBER] {
            let response = call(
                &router,
                "moderation.Block",
                signed(
                    sign(MODERATOR, "@mod"),
                    json!({"creator_channel_id": creator, "blocked_channel_id": SPAMMER, "blocked_channel_name": "@spam"}),
                ),
            )
            .await;
            assert_eq!(result(response)["creator_channel_id"], creator);
        }
    }

    #[tokio::test]
    async fn test_shared_list_flow_over_rpc() {
        let (_dir, router) = router().await;
        let owner = || sign(OWNER, "@owner");
        let member = || sign(MEMBER, "@member");

        let list = result(
            call(
                &router,
                "blockedlist.Update",
                signed(owner(), json!({"name": "Spam Hunters", "strike_one": 12})),
            )
            .await,
        );
        let list_id = list["id"].as_u64().unwrap();
        assert_eq!(list["name"], "Spam Hunters");

        let invite = result(
            call(
                &router,
                "blockedlist.Invite",
                signed(
                    owner(),
                    json!({
                        "blocked_list_id": list_id,
                        "invitee_channel_id": MEMBER,
                        "invitee_channel_name": "@member",
                        "message": "join us"
                    }),
                ),
            )
            .await,
        );
        assert_eq!(invite["invite"]["status"], "pending");
        assert_eq!(invite["already_member"], false);

        let duplicate = call(
            &router,
            "blockedlist.Invite",
            signed(
                owner(),
                json!({"blocked_list_id": list_id, "invitee_channel_id": MEMBER, "invitee_channel_name": "@member"}),
            ),
        )
        .await;
        assert_eq!(error_code(duplicate), 409);

        let accepted = result(
            call(
                &router,
                "blockedlist.Accept",
                signed(member(), json!({"blocked_list_id": list_id, "accepted": true})),
            )
            .await,
        );
        assert_eq!(accepted["changed"], true);

        let view = result(
            call(&router, "blockedlist.Get", json!({"blocked_list_id": list_id, "status": 2})).await,
        );
        assert_eq!(view["invited_members"][0]["invitee_channel_id"], MEMBER);
        assert_eq!(view["effective_settings"]["strike_one"], 12);
        assert_eq!(view["effective_settings"]["strike_two"], 168);

        let config_only = result(
            call(&router, "blockedlist.Get", json!({"blocked_list_id": list_id, "status": 4})).await,
        );
        assert_eq!(config_only["invited_members"], json!([]));

        let bad_filter = call(&router, "blockedlist.Get", json!({"blocked_list_id": list_id, "status": 9})).await;
        assert_eq!(error_code(bad_filter), 400);
    }

    #[tokio::test]
    async fn test_rescind_over_rpc() {
        let (_dir, router) = router().await;
        let list = result(
            call(&router, "blockedlist.Update", signed(sign(OWNER, "@owner"), json!({}))).await,
        );
        call(
            &router,
            "blockedlist.Invite",
            signed(
                sign(OWNER, "@owner"),
                json!({"blocked_list_id": list["id"], "invitee_channel_id": MEMBER, "invitee_channel_name": "@member"}),
            ),
        )
        .await;

        let response = call(
            &router,
            "blockedlist.Rescind",
            signed(
                sign(OWNER, "@owner"),
                json!({"invited_channel_id": MEMBER, "invited_channel_name": "@member"}),
            ),
        )
        .await;
        assert_eq!(result(response)["rescinded"], 1);

        let again = call(
            &router,
            "blockedlist.Rescind",
            signed(sign(OWNER, "@owner"), json!({"invited_channel_id": MEMBER})),
        )
        .await;
        assert_eq!(error_code(again), 404);
    }

    #[tokio::test]
    async fn test_delegate_can_block_for_creator() {
        let (_dir, router) = router().await;

        // Not yet a delegate
        let refused = call(
            &router,
            "moderation.Block",
            signed(
                sign(MODERATOR, "@mod"),
                json!({"creator_channel_id": OWNER, "blocked_channel_id": MEMBER, "blocked_channel_name": "@member"}),
            ),
        )
        .await;
        assert_eq!(error_code(refused), 401);

        call(
            &router,
            "moderation.AddDelegate",
            signed(
                sign(OWNER, "@owner"),
                json!({"mod_channel_id": MODERATOR, "mod_channel_name": "@mod"}),
            ),
        )
        .await;
        let blocked = result(
            call(
                &router,
                "moderation.Block",
                signed(
                    sign(MODERATOR, "@mod"),
                    json!({"creator_channel_id": OWNER, "blocked_channel_id": MEMBER, "blocked_channel_name": "@member"}),
                ),
            )
            .await,
        );
        assert_eq!(blocked["creator_channel_id"], OWNER);

        let verdict = result(
            call(
                &router,
                "filter.ScreenComment",
                json!({"commenter_channel_id": MEMBER, "creator_channel_id": OWNER, "comment": "hi"}),
            )
            .await,
        );
        assert_eq!(verdict, json!({"verdict": "blocked"}));

        let removed = call(
            &router,
            "moderation.UnBlock",
            signed(sign(OWNER, "@owner"), json!({"blocked_channel_id": MEMBER})),
        )
        .await;
        assert!(removed.error.is_none());
    }

    #[tokio::test]
    async fn test_muted_words_and_screening() {
        let (_dir, router) = router().await;
        let words = result(
            call(
                &router,
                "settings.BlockWord",
                signed(sign(OWNER, "@owner"), json!({"words": "scam,crypto"})),
            )
            .await,
        );
        assert_eq!(words["words"], json!(["scam", "crypto"]));

        let verdict = result(
            call(
                &router,
                "filter.ScreenComment",
                json!({"commenter_channel_id": MEMBER, "creator_channel_id": OWNER, "comment": "free crypto"}),
            )
            .await,
        );
        assert_eq!(verdict, json!({"verdict": "muted_word", "detail": "crypto"}));

        let spam = result(
            call(
                &router,
                "filter.ScreenComment",
                json!({"commenter_channel_id": SPAMMER, "creator_channel_id": OWNER, "comment": "hello"}),
            )
            .await,
        );
        assert_eq!(spam["verdict"], "distrusted_commenter");

        let remaining = result(
            call(
                &router,
                "settings.UnBlockWord",
                signed(sign(OWNER, "@owner"), json!({"words": "scam"})),
            )
            .await,
        );
        assert_eq!(remaining["words"], json!(["crypto"]));

        let listed = result(
            call(&router, "settings.ListBlockedWords", signed(sign(OWNER, "@owner"), json!({}))).await,
        );
        assert_eq!(listed["words"], json!(["crypto"]));
    }
}
