//! Fixtures shared by the scene tests.

pub(crate) const ROOM: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<COLLADA xmlns="http://www.collada.org/2005/11/COLLADASchema" version="1.4.1">
  <library_lights>
    <light id="Lamp-light" name="Lamp">
      <technique_common>
        <point>
          <color sid="color">1 0.5 0.25</color>
          <constant_attenuation>2.5</constant_attenuation>
        </point>
      </technique_common>
    </light>
  </library_lights>
  <library_materials>
    <material id="Wood-material" name="oak"/>
    <material id="Cloth-material" name="fabric"/>
    <material id="Spare-material" name="spare"/>
  </library_materials>
  <library_visual_scenes>
    <visual_scene id="Scene" name="Scene">
      <node id="Floor" name="primitive/plane:floor">
        <matrix sid="transform">1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1</matrix>
        <instance_geometry url="#Plane-mesh">
          <bind_material>
            <technique_common>
              <instance_material symbol="Wood-material" target="#Wood-material"/>
            </technique_common>
          </bind_material>
        </instance_geometry>
      </node>
      <node id="Group" name="Group">
        <matrix sid="transform">1 0 0 5 0 1 0 0 0 0 1 0 0 0 0 1</matrix>
        <node id="Chair" name="model:chair">
          <matrix sid="transform">1 0 0 1 0 1 0 2 0 0 1 3 0 0 0 1</matrix>
          <instance_geometry url="#Chair-mesh">
            <bind_material>
              <technique_common>
                <instance_material symbol="Cloth-material" target="#Cloth-material"/>
              </technique_common>
            </bind_material>
          </instance_geometry>
          <node id="Seat" name="connection/receiver:seat">
            <matrix sid="transform">1 0 0 0 0 1 0 1 0 0 1 0 0 0 0 1</matrix>
          </node>
        </node>
      </node>
      <node id="Lamp" name="light/point:lamp">
        <instance_light url="#Lamp-light"/>
      </node>
      <node id="Odd" name="camera:main"/>
    </visual_scene>
  </library_visual_scenes>
</COLLADA>
"##;
