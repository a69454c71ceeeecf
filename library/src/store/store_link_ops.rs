use log::debug;

use super::GraphStore;
use crate::authority::AuthorityClient;
use crate::error::GraphError;
use crate::model::{Link, LinkEnd, LinkId, PortDirection, PortRef};

/// Link operations.
impl GraphStore {
    /// Start a user-drawn link with no endpoints.
    pub fn new_link(&mut self) -> LinkId {
        let link = Link::provisional();
        let id = link.id.clone();
        self.links.insert(id.clone(), link);
        id
    }

    pub fn set_source_port(
        &mut self,
        client: &mut dyn AuthorityClient,
        link: &LinkId,
        port: PortRef,
    ) -> Result<(), GraphError> {
        self.set_link_end(client, link, LinkEnd::Source, port)
    }

    pub fn set_target_port(
        &mut self,
        client: &mut dyn AuthorityClient,
        link: &LinkId,
        port: PortRef,
    ) -> Result<(), GraphError> {
        self.set_link_end(client, link, LinkEnd::Target, port)
    }

    /// Attach one end of a link to `port`.
    ///
    /// Re-asserting the current port is a no-op. An `in` port keeps at most one
    /// link: its previous occupant is removed (and deleted on the authority)
    /// before the new link attaches. Once both ends are set on a provisional
    /// link, exactly one `link_create` is sent with the `out` side as `from`.
    pub fn set_link_end(
        &mut self,
        client: &mut dyn AuthorityClient,
        link_id: &LinkId,
        end: LinkEnd,
        port: PortRef,
    ) -> Result<(), GraphError> {
        let link = self
            .links
            .get(link_id)
            .ok_or_else(|| GraphError::UnknownLink(link_id.clone()))?;
        if link.end(end) == Some(&port) {
            return Ok(());
        }
        let previous = link.end(end).cloned();
        let other = link.end(end.opposite()).cloned();

        let direction = self.require_port(&port)?.direction;
        if let Some(other) = &other {
            if self.require_port(other)?.direction == direction {
                return Err(GraphError::SameDirection(direction));
            }
        }

        let occupants = match direction {
            PortDirection::In => self.require_port(&port)?.other_links(link_id),
            PortDirection::Out => Vec::new(),
        };
        self.check_no_implicit(&port, &occupants)?;
        for occupant in occupants {
            debug!("Evicting link {} from {}", occupant, port);
            self.remove_link(client, &occupant)?;
        }

        if let Some(previous) = previous {
            if let Some(p) = self.port_mut(&previous) {
                p.remove_link(link_id);
            }
        }
        if let Some(p) = self.port_mut(&port) {
            p.add_link(link_id.clone());
        }
        if let Some(link) = self.links.get_mut(link_id) {
            link.set_end(end, Some(port));
        }

        self.announce_if_complete(client, link_id);
        Ok(())
    }

    fn check_no_implicit(&self, port: &PortRef, occupants: &[LinkId]) -> Result<(), GraphError> {
        match occupants
            .iter()
            .find(|l| self.links.get(*l).is_some_and(Link::is_implicit))
        {
            Some(implicit) => Err(GraphError::ImplicitLinkOccupied {
                block: port.block.clone(),
                port: port.port.clone(),
                link: implicit.clone(),
            }),
            None => Ok(()),
        }
    }

    fn announce_if_complete(&mut self, client: &mut dyn AuthorityClient, link_id: &LinkId) {
        let Some(link) = self.links.get(link_id) else {
            return;
        };
        if !link.is_provisional() || link.is_announced() {
            return;
        }
        let Some((from, to)) = self.oriented_ends(link) else {
            return;
        };
        client.create_link(&from, &to);
        if let Some(link) = self.links.get_mut(link_id) {
            link.mark_announced();
        }
    }

    /// Draw a complete link in one step. `from` and `to` may be given in either direction.
    ///
    /// Both ends are checked before anything changes, so a rejected link
    /// evicts nothing and sends nothing.
    pub fn connect(
        &mut self,
        client: &mut dyn AuthorityClient,
        from: PortRef,
        to: PortRef,
    ) -> Result<LinkId, GraphError> {
        let from_dir = self.require_port(&from)?.direction;
        let to_dir = self.require_port(&to)?.direction;
        if from_dir == to_dir {
            return Err(GraphError::SameDirection(from_dir));
        }
        let inbound = if to_dir == PortDirection::In { &to } else { &from };
        self.check_no_implicit(inbound, self.require_port(inbound)?.links())?;

        let id = self.new_link();
        let attached = self
            .set_source_port(client, &id, from)
            .and_then(|_| self.set_target_port(client, &id, to));
        if let Err(e) = attached {
            self.detach_link(&id);
            return Err(e);
        }
        Ok(id)
    }

    /// Remove a link at the user's request.
    ///
    /// Implicit links are structural and stay put (`Ok(false)`). Links the
    /// authority knows about are deleted there too. An announced link still
    /// waiting for its id is remembered and deleted when its echo arrives.
    pub fn remove_link(
        &mut self,
        client: &mut dyn AuthorityClient,
        id: &LinkId,
    ) -> Result<bool, GraphError> {
        let link = self
            .links
            .get(id)
            .ok_or_else(|| GraphError::UnknownLink(id.clone()))?;
        if link.is_implicit() {
            debug!("Ignoring removal of implicit link {}", id);
            return Ok(false);
        }
        let ends = self.oriented_ends(link);
        if let Some(link) = self.detach_link(id) {
            match (link.id.authority_id(), ends) {
                (Some(authority_id), _) => client.delete_link(authority_id),
                (None, Some(ends)) if link.is_announced() => {
                    debug!("Link {} removed before the authority confirmed it", id);
                    self.retracted.push(ends);
                }
                _ => {}
            }
        }
        Ok(true)
    }

    /// Drop a link locally, releasing both of its ports. Sends nothing.
    pub(crate) fn detach_link(&mut self, id: &LinkId) -> Option<Link> {
        let link = self.links.remove(id)?;
        for end in link.ends() {
            if let Some(port) = self.port_mut(end) {
                port.remove_link(id);
            }
        }
        Some(link)
    }

    /// Swap a provisional id for the authority's one, keeping port attachments.
    pub(crate) fn rekey_link(&mut self, old: &LinkId, authority_id: &str) -> Option<LinkId> {
        let mut link = self.links.remove(old)?;
        link.confirm(authority_id);
        let new_id = link.id.clone();
        let ends: Vec<PortRef> = link.ends().cloned().collect();
        for end in &ends {
            if let Some(port) = self.port_mut(end) {
                port.replace_link(old, new_id.clone());
            }
        }
        self.links.insert(new_id.clone(), link);
        Some(new_id)
    }

    /// Forget a retracted link joining `from` and `to` (either order). True if one was pending.
    pub(crate) fn take_retracted(&mut self, from: &PortRef, to: &PortRef) -> bool {
        let position = self
            .retracted
            .iter()
            .position(|(a, b)| (a == from && b == to) || (a == to && b == from));
        match position {
            Some(i) => {
                self.retracted.remove(i);
                true
            }
            None => false,
        }
    }

    /// The provisional link already joining `from` to `to`, awaiting its id.
    pub(crate) fn find_pending_link(&self, from: &PortRef, to: &PortRef) -> Option<LinkId> {
        self.links
            .values()
            .filter(|l| l.is_provisional() && l.is_announced())
            .find(|l| {
                self.oriented_ends(l)
                    .is_some_and(|(source, target)| &source == from && &target == to)
            })
            .map(|l| l.id.clone())
    }
}
