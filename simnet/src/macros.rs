/// Declare an RPC service.
///
/// Expands to a module containing a `Request` enum, per-method response
/// structs, an async `Service` trait implemented by the application, a
/// cloneable `Client` with one async method per RPC, and a `Server` that
/// drives a `Service` from its request channel.
///
/// A handler returning `Err` makes the server drop the reply, so the
/// caller sees the same failure as an unreachable peer; the server itself
/// keeps serving.
#[macro_export]
macro_rules! service {
    () => {
        compile_error!("empty service is not allowed");
    };
    (
        $(#[$service_attr:meta])*
        service $svc_name:ident {
            $(
                $(#[$method_attr:meta])*
                fn $method_name:ident($($arg_id:ident: $arg_ty:ty),*) -> $output:ty;
            )*
        }
    ) => {
        #[allow(missing_docs)]
        $(#[$service_attr])*
        pub mod $svc_name {
            use super::*;

            use $crate::network::Envelope;
            use $crate::{client, server};

            use $crate::tokio::sync::mpsc::{self, Sender, Receiver};
            use $crate::serde_json;
            use $crate::serde::{Serialize, Deserialize};
            use $crate::anyhow::{Result, anyhow};
            use $crate::async_trait;
            use $crate::log::{error, trace};

            // The generated impls name simnet's serde explicitly, so
            // callers do not need serde among their own dependencies.
            #[derive(Debug, Deserialize, Serialize)]
            #[serde(crate = "::simnet::serde")]
            pub enum Request {
                $(
                    #[allow(non_camel_case_types)]
                    $method_name { $($arg_id : $arg_ty),* }
                ),*
            }

            mod response {
                use super::*;
                $(
                    #[derive(Deserialize, Serialize)]
                    #[serde(crate = "::simnet::serde")]
                    #[allow(non_camel_case_types)]
                    pub struct $method_name {
                        pub data: $output
                    }
                )*
            }

            #[async_trait]
            pub trait Service: Send + 'static {
                $(
                    $(#[$method_attr])*
                    async fn $method_name(&mut self, $($arg_id : $arg_ty),* ) -> Result<$output>;
                )*
            }

            #[derive(Debug, Clone)]
            pub struct Client {
                server_id: String,
                tx: Sender<Envelope>,
            }

            impl Client {
                $(
                    pub async fn $method_name(&self, $($arg_id : $arg_ty),* ) -> Result<$output> {
                        let req = Request::$method_name {
                            $($arg_id),*
                        };
                        let resp = self.call(serde_json::to_string(&req)?).await?;
                        let resp: response::$method_name = serde_json::from_str(&resp)?;
                        Ok(resp.data)
                    }
                )*

                pub async fn call(&self, req: String) -> Result<String> {
                    let (tx, mut rx) = mpsc::channel(1);
                    self.tx
                        .send(Envelope {
                            to: self.server_id.clone(),
                            reply: tx,
                            body: req,
                        })
                        .await?;
                    match $crate::tokio::time::timeout($crate::RPC_TIMEOUT, rx.recv()).await {
                        Ok(Some(resp)) => {
                            trace!("call to {}: {}", self.server_id, &resp);
                            Ok(resp)
                        }
                        Ok(None) => Err(anyhow!("{} unreachable", self.server_id)),
                        Err(_) => Err(anyhow!("call to {} timed out", self.server_id)),
                    }
                }
            }

            impl client::Client for Client {
                fn from_server(server_id: String, net_tx: Sender<Envelope>) -> Self {
                    Self {
                        server_id,
                        tx: net_tx,
                    }
                }
            }

            #[derive(Debug)]
            pub struct Server<T: Service + Send> {
                svc: T,
                tx: Sender<Envelope>,
                rx: Receiver<Envelope>,
            }

            #[async_trait]
            impl<T: Service + Send> server::Server for Server<T> {
                type Service = T;

                fn from_service(svc: Self::Service) -> Self {
                    let (tx, rx) = mpsc::channel(100);
                    Self { svc, tx, rx }
                }

                fn client_chan(&self) -> Sender<Envelope> {
                    self.tx.clone()
                }

                async fn handle(&mut self) -> Result<()> {
                    let Envelope { reply, body, .. } = self
                        .rx
                        .recv()
                        .await
                        .ok_or_else(|| anyhow!("request channel closed"))?;
                    trace!("handle recv: {}", &body);
                    let req: Request = serde_json::from_str(&body)?;
                    match req {
                        $(
                            Request::$method_name { $($arg_id),* } => {
                                match self.svc.$method_name($($arg_id),* ).await {
                                    Ok(data) => {
                                        let resp = serde_json::to_string(&response::$method_name { data })?;
                                        trace!("handle send: {}", &resp);
                                        // Caller may have timed out already.
                                        let _ = reply.send(resp).await;
                                    }
                                    Err(e) => {
                                        // No reply: the caller sees an
                                        // unreachable peer and retries.
                                        error!("handler error: {}", e);
                                    }
                                }
                            }
                        )*
                    }
                    Ok(())
                }
            }
        }
    };
}
