use tracing::{debug, error, info};

use crate::{
    BorrowRequest, BorrowRequestField, Component, Direction, Error, LocalStore, Query, RecordKind,
    Rejection, Result, inventory::stock_delta,
};

use super::FailoverRouter;

impl<L: LocalStore> FailoverRouter<L> {
    pub async fn get_components(&self) -> Result<Vec<Component>> {
        let query = Query::all();
        self.route(
            "get_components",
            self.remote.list::<Component>(&query),
            |local| local.list::<Component>(&query),
        )
        .await
    }

    pub async fn get_component(&self, id: &str) -> Result<Option<Component>> {
        self.route(
            "get_component",
            self.remote.find::<Component>(id),
            |local| local.get::<Component>(id),
        )
        .await
    }

    pub async fn add_component(&self, component: &Component) -> Result<()> {
        check_stock(component)?;
        self.route("add_component", self.remote.add(component), |local| {
            local.put(component)
        })
        .await
    }

    pub async fn update_component(&self, component: &Component) -> Result<()> {
        check_stock(component)?;
        self.route(
            "update_component",
            self.remote.replace(component),
            |local| local.put(component),
        )
        .await
    }

    pub async fn delete_component(&self, id: &str) -> Result<()> {
        self.route(
            "delete_component",
            self.remote.delete::<Component>(id),
            |local| local.delete::<Component>(id),
        )
        .await
    }

    /// All borrow requests, newest first.
    pub async fn get_requests(&self) -> Result<Vec<BorrowRequest>> {
        let query = Query::all().order_by(BorrowRequestField::RequestDate, Direction::Descending);
        self.list_requests("get_requests", query).await
    }

    /// Requests filed by one student, newest first.
    pub async fn get_user_requests(&self, student_id: &str) -> Result<Vec<BorrowRequest>> {
        let query = Query::all()
            .eq(BorrowRequestField::StudentId, student_id)
            .order_by(BorrowRequestField::RequestDate, Direction::Descending);
        self.list_requests("get_user_requests", query).await
    }

    pub async fn get_request(&self, id: &str) -> Result<Option<BorrowRequest>> {
        self.route(
            "get_request",
            self.remote.find::<BorrowRequest>(id),
            |local| local.get::<BorrowRequest>(id),
        )
        .await
    }

    /// Files a new request. A request created already approved takes its
    /// stock immediately.
    ///
    /// The stock change is checked before anything is written and applied
    /// only once the request itself has been stored.
    pub async fn add_request(&self, request: &BorrowRequest) -> Result<()> {
        let restocked = self.restock(None, request).await?;
        self.route("add_request", self.remote.add(request), |local| {
            local.put(request)
        })
        .await?;
        self.commit_stock(restocked, request).await
    }

    /// Overwrites a request, moving component stock when the request enters
    /// or leaves the approved state.
    ///
    /// If the stock change would take a component outside
    /// `0..=totalQuantity`, the update is rejected and nothing is written.
    pub async fn update_request(&self, request: &BorrowRequest) -> Result<()> {
        let previous = self.get_request(&request.id).await?;
        if let Some(previous) = &previous
            && previous.component_id != request.component_id
        {
            return Err(Error::Rejected(Rejection::Invalid(format!(
                "request {} cannot move from component {} to {}",
                request.id, previous.component_id, request.component_id
            ))));
        }
        let restocked = self.restock(previous.as_ref(), request).await?;
        self.route(
            "update_request",
            self.remote.replace(request),
            |local| local.put(request),
        )
        .await?;
        self.commit_stock(restocked, request).await
    }

    async fn list_requests(&self, op: &'static str, query: Query) -> Result<Vec<BorrowRequest>> {
        self.route(
            op,
            self.remote.list::<BorrowRequest>(&query),
            |local| local.list::<BorrowRequest>(&query),
        )
        .await
    }

    /// The component as it will be once `next` replaces `previous`, or
    /// `None` when no stock moves.
    async fn restock(
        &self,
        previous: Option<&BorrowRequest>,
        next: &BorrowRequest,
    ) -> Result<Option<Component>> {
        let delta = stock_delta(previous, next);
        if delta == 0 {
            return Ok(None);
        }
        let component = self
            .get_component(&next.component_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                kind: RecordKind::Component,
                id: next.component_id.clone(),
            })?;
        let component = component
            .apply_stock_delta(delta)
            .map_err(|e| Error::Rejected(Rejection::Invalid(e.to_string())))?;
        debug!(component = %component.id, request = %next.id, delta, "Stock change accepted");
        Ok(Some(component))
    }

    async fn commit_stock(
        &self,
        component: Option<Component>,
        request: &BorrowRequest,
    ) -> Result<()> {
        let Some(component) = component else {
            return Ok(());
        };
        info!(
            component = %component.id,
            request = %request.id,
            available = component.available_quantity,
            "Adjusting stock"
        );
        self.update_component(&component).await.inspect_err(|e| {
            error!(
                component = %component.id,
                request = %request.id,
                error = %e,
                "Request stored but stock could not be adjusted"
            );
        })
    }
}

fn check_stock(component: &Component) -> Result<()> {
    component
        .check_stock()
        .map_err(|e| Error::Rejected(Rejection::Invalid(e.to_string())))
}
